//! load our filesystem, register it to `FUSE` and mount it
use byte_unit::Byte;
use fuser::MountOption;
use log::info;
use std::path::Path;

use crate::fs::{Bootstrap, FlatFs, Geometry, ReformatPolicy, FS_NAME};

/// translate `-o` arguments into [MountOption]s,
/// unknown ones are handed to `FUSE` as they are
pub fn mount_options<S>(options: &[S]) -> Vec<MountOption>
where
    S: AsRef<str>,
{
    let mut opts = vec![MountOption::FSName(FS_NAME.to_string())];
    opts.extend(options.iter().map(|option| match option.as_ref() {
        "auto_unmount" => MountOption::AutoUnmount,
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "default_permissions" => MountOption::DefaultPermissions,
        "ro" => MountOption::RO,
        "rw" => MountOption::RW,
        other => MountOption::CUSTOM(other.to_string()),
    }));
    opts
}

/// the line printed once the filesystem is ready
pub fn summary(fs: &FlatFs) -> String {
    let superblock = fs.superblock();
    format!(
        "{} files, {} bytes used ({})",
        superblock.file_count,
        superblock.last_alloc,
        Byte::from_bytes(superblock.last_alloc as _).get_appropriate_unit(true)
    )
}

/// bootstrap the filesystem in `image_path` and serve it at `mountpoint`,
/// blocking until it is unmounted
pub fn mount<P, Q, S>(
    image_path: P,
    mountpoint: Q,
    image_size: u64,
    options: &[S],
    policy: ReformatPolicy,
) -> anyhow::Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    S: AsRef<str>,
{
    let geometry = Geometry::new(image_size)?;
    let (fs, how) = FlatFs::open_or_format(image_path.as_ref(), geometry, policy)?;
    if let Bootstrap::Formatted(reason) = how {
        println!("{reason}, created a new filesystem");
    }
    println!("mounting at {:?}", mountpoint.as_ref());
    println!("{}", summary(&fs));

    let opts = mount_options(options);
    info!("mount options: {opts:?}");
    Ok(fuser::mount2(fs, mountpoint, &opts)?)
}
