//! create our filesystem
use crate::fs::{FlatFs, Geometry, MAX_FILES};
use anyhow::bail;
use byte_unit::Byte;
use std::path::Path;

/// create a new filesystem, given the path of the image file and its size
/// # Params
/// - `image_file_path`: the path of the image file
/// - `file_size`: the size of the image file
/// - `force`: overwrite the image file if it exists
///
/// # Return
/// an [anyhow::Result] type to indicate whether the operation is successful
pub fn mkfs<P>(image_file_path: P, file_size: u64, force: bool) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let image_file_path = image_file_path.as_ref();
    // check if specified image_file_size is enough before touching anything
    let geometry = Geometry::new(file_size)?;
    if image_file_path.exists() && !force {
        bail!("{image_file_path:?} already exists, use `--force` to overwrite it");
    }

    FlatFs::format(image_file_path, geometry)?;
    println!(
        "created {:?}: {} files of at most {} each",
        image_file_path,
        MAX_FILES,
        Byte::from_bytes(geometry.slot_size() as _).get_appropriate_unit(true)
    );
    Ok(())
}
