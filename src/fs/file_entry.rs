use std::time::UNIX_EPOCH;

use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::{fs_size_calculator::FILE_ENTRY_SIZE, time_util, traits::FixedRecord};

use super::{FileKind, FsError, FsResult, NAME_MAX_LEN};

/// one record of the file table
///
/// `start` is kept for layout compatibility and is always `0`,
/// the data of an entry lives in the slot addressed by its table index.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileEntry {
    #[serde(deserialize_with = "nonzero_flag")]
    pub used: bool,
    /// NUL padded name
    pub name: [u8; NAME_MAX_LEN],
    pub start: u32,
    /// logical length in bytes
    pub size: u32,
    pub perms: u32,
    /// last modification, seconds since the epoch
    pub mtime: u32,
}

/// any nonzero byte marks an entry as used
fn nonzero_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(u8::deserialize(deserializer)? != 0)
}

impl FixedRecord for FileEntry {
    const SIZE: usize = FILE_ENTRY_SIZE as usize;
}

/// check that `name` fits the name buffer with its trailing NUL
pub fn validate_name(name: &[u8]) -> FsResult<()> {
    if name.is_empty() || name.contains(&0) {
        return Err(FsError::InvalidArgument);
    }
    if name.len() >= NAME_MAX_LEN {
        return Err(FsError::NameTooLong(NAME_MAX_LEN - 1));
    }
    Ok(())
}

impl FileEntry {
    /// a used entry of size zero, modified now
    pub fn new(name: &[u8], perms: u32) -> FsResult<Self> {
        validate_name(name)?;
        let mut entry = FileEntry {
            used: true,
            perms,
            mtime: time_util::now(),
            ..FileEntry::default()
        };
        entry.name[..name.len()].copy_from_slice(name);
        Ok(entry)
    }

    /// the stored name without its NUL padding
    pub fn name(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(NAME_MAX_LEN);
        &self.name[..len]
    }

    pub fn name_matches(&self, name: &[u8]) -> bool {
        self.used && self.name() == name
    }

    pub fn touch(&mut self) {
        self.mtime = time_util::now();
    }

    /// zero the whole record, marking it unused
    pub fn clear(&mut self) {
        *self = FileEntry::default();
    }

    /// kernel-facing attributes of this entry
    /// # Params
    /// - `ino`: the inode number the kernel knows this entry by
    /// - `uid`/`gid`: owner reported for every file
    /// - `blksize`: preferred I/O size, the slot capacity
    pub fn file_attr(&self, ino: u64, uid: u32, gid: u32, blksize: u32) -> fuser::FileAttr {
        let mtime = time_util::to_system_time(self.mtime);
        fuser::FileAttr {
            ino,
            size: self.size as u64,
            blocks: (self.size as u64).div_ceil(512),
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: UNIX_EPOCH,
            kind: FileKind::RegularFile.into(),
            perm: (self.perms & 0o7777) as u16,
            nlink: 1,
            uid,
            gid,
            rdev: 0,
            blksize,
            flags: 0,
        }
    }
}
