use anyhow::anyhow;
use std::time::{self, Duration, SystemTime, UNIX_EPOCH};

/// seconds since `1970-1-1 00:00:00`, named as [UNIX_EPOCH],
/// truncated to the 32-bit field stored on disk
pub fn now() -> u32 {
    let now = SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs() as u32
}

/// convert a stored timestamp back to a [SystemTime]
pub fn to_system_time(secs: u32) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs as u64)
}

/// convert a [SystemTime] to a storable timestamp
pub fn from_system_time(value: SystemTime) -> anyhow::Result<u32> {
    match value.duration_since(UNIX_EPOCH) {
        Ok(duration) => u32::try_from(duration.as_secs())
            .map_err(|_| anyhow!("time {value:?} does not fit a 32-bit timestamp")),
        Err(before_epoch_error) => Err(anyhow!(
            "doesn't support time before UNIX_EPOCH: {}",
            before_epoch_error
        )),
    }
}
