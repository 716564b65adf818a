//! describe an existing filesystem without mounting it
use std::path::Path;

use crate::{
    fs::{FlatFs, Geometry, MAX_FILES},
    mount::summary,
};

/// render the superblock and the used file table entries
pub fn describe(fs: &FlatFs) -> String {
    let superblock = fs.superblock();
    let geometry = fs.geometry();
    let mut out = format!(
        "magic {:#x}, version {}, {} of {} slots used, slot size {} bytes\n{}\n",
        superblock.magic,
        superblock.version,
        superblock.file_count,
        MAX_FILES,
        geometry.slot_size(),
        summary(fs)
    );
    for (slot, entry) in fs.files().iter_used() {
        out.push_str(&format!(
            "{slot:>3} {:<31} {:>8} {:o} {}\n",
            entry.name().escape_ascii().to_string(),
            entry.size,
            entry.perms & 0o7777,
            entry.mtime
        ));
    }
    out
}

/// load the filesystem in `image_path` and print it, never reformatting
pub fn info<P>(image_path: P, image_size: u64) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let fs = FlatFs::load(image_path, Geometry::new(image_size)?)?;
    print!("{}", describe(&fs));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fs::DEFAULT_IMAGE_SIZE, utils::init_test_environment::init_test_environment};

    #[test]
    fn test_describe() {
        let (_dir, mut fs) = init_test_environment();
        let handle = fs.create("/notes.md", 0o640).unwrap();
        fs.write(handle, b"# notes", 0).unwrap();
        let out = describe(&fs);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("magic 0xdeadbeef, version 1, 1 of 64 slots used"));
        assert!(lines[2].contains("notes.md"));
        assert!(lines[2].contains(" 7 640 "));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_info_does_not_reformat() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("garbage.db");
        std::fs::write(&image_path, vec![1u8; DEFAULT_IMAGE_SIZE as usize]).unwrap();
        assert!(info(&image_path, DEFAULT_IMAGE_SIZE).is_err());
        assert_eq!(
            std::fs::read(&image_path).unwrap(),
            vec![1u8; DEFAULT_IMAGE_SIZE as usize]
        );
        assert!(info(dir.path().join("missing.db"), DEFAULT_IMAGE_SIZE).is_err());
    }
}
