//! file operations on the flat namespace, addressed by path or by handle
use std::{
    ffi::{OsStr, OsString},
    os::unix::prelude::OsStrExt,
    time::UNIX_EPOCH,
};

use fuser::FileAttr;
use log::{debug, info};

use super::{
    bare_name, FileEntry, FileKind, FlatFs, FsError, FsResult, DEFAULT_FILE_PERMS,
    FIRST_FILE_INODE, MAX_FILES, ROOT_DIR_PERMS, ROOT_INODE,
};

/// an open file, the index of its slot
pub type Handle = u64;

/// one name yielded by [FlatFs::list]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    pub kind: FileKind,
    pub name: OsString,
}

#[inline]
pub fn slot_to_ino(slot: usize) -> u64 {
    slot as u64 + FIRST_FILE_INODE
}

/// the slot behind a file inode, `None` for the root and out of range numbers
#[inline]
pub fn ino_to_slot(ino: u64) -> Option<usize> {
    let slot = ino.checked_sub(FIRST_FILE_INODE)? as usize;
    (slot < MAX_FILES).then_some(slot)
}

fn is_root(path: &[u8]) -> bool {
    path == b"/"
}

/// attributes
impl FlatFs {
    /// the synthetic root directory
    pub fn root_attr(&self) -> FileAttr {
        let (uid, gid) = self.owner();
        FileAttr {
            ino: ROOT_INODE,
            size: 0,
            blocks: 0,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind: FileKind::Directory.into(),
            perm: ROOT_DIR_PERMS,
            nlink: 2,
            uid,
            gid,
            rdev: 0,
            blksize: self.geometry().slot_size() as u32,
            flags: 0,
        }
    }

    pub fn slot_attr(&self, slot: usize) -> FsResult<FileAttr> {
        let entry = self.files().used(slot).ok_or(FsError::NotFound)?;
        let (uid, gid) = self.owner();
        Ok(entry.file_attr(
            slot_to_ino(slot),
            uid,
            gid,
            self.geometry().slot_size() as u32,
        ))
    }

    /// the slot of an open file, if it is still in use
    fn slot_of(&self, handle: Handle) -> FsResult<usize> {
        let slot = usize::try_from(handle).map_err(|_| FsError::BadDescriptor(handle))?;
        self.files()
            .used(slot)
            .map(|_| slot)
            .ok_or(FsError::BadDescriptor(handle))
    }

    fn resolve(&self, path: &[u8]) -> FsResult<usize> {
        self.files().find_by_name(path).ok_or(FsError::NotFound)
    }
}

/// namespace operations
impl FlatFs {
    /// attributes of `path`, the root or a file
    pub fn lookup<P>(&self, path: P) -> FsResult<FileAttr>
    where
        P: AsRef<OsStr>,
    {
        let path = path.as_ref().as_bytes();
        if is_root(path) {
            return Ok(self.root_attr());
        }
        self.slot_attr(self.resolve(path)?)
    }

    /// `.`, `..` and every file, in file table order
    pub fn list<P>(&self, path: P) -> FsResult<Vec<DirEntry>>
    where
        P: AsRef<OsStr>,
    {
        if !is_root(path.as_ref().as_bytes()) {
            return Err(FsError::NotADirectory);
        }
        let mut entries = Vec::with_capacity(2 + self.files().used_count());
        for dot in [".", ".."] {
            entries.push(DirEntry {
                ino: ROOT_INODE,
                kind: FileKind::Directory,
                name: dot.into(),
            });
        }
        entries.extend(self.files().iter_used().map(|(slot, entry)| DirEntry {
            ino: slot_to_ino(slot),
            kind: FileKind::RegularFile,
            name: OsStr::from_bytes(entry.name()).to_os_string(),
        }));
        Ok(entries)
    }

    /// open `path`, creating it with default permissions when `create` is set
    /// and emptying it when it exists and `truncate` is set
    /// # Return
    /// the handle for subsequent reads and writes
    pub fn open<P>(&mut self, path: P, create: bool, truncate: bool) -> FsResult<Handle>
    where
        P: AsRef<OsStr>,
    {
        let name = bare_name(path.as_ref().as_bytes());
        match self.files().find_by_name(name) {
            None if !create => Err(FsError::NotFound),
            None => self.allocate(name, DEFAULT_FILE_PERMS),
            Some(slot) => {
                if truncate {
                    self.truncate_slot(slot, 0)?;
                    info!("truncated '{}'", name.escape_ascii());
                }
                Ok(slot as Handle)
            }
        }
    }

    /// create `path` with `mode`, an existing file is opened as it is
    pub fn create<P>(&mut self, path: P, mode: u32) -> FsResult<Handle>
    where
        P: AsRef<OsStr>,
    {
        let name = bare_name(path.as_ref().as_bytes());
        match self.files().find_by_name(name) {
            Some(slot) => Ok(slot as Handle),
            None => self.allocate(name, mode),
        }
    }

    /// set the logical size of `path`, without touching its data
    pub fn truncate<P>(&mut self, path: P, new_size: u64) -> FsResult<()>
    where
        P: AsRef<OsStr>,
    {
        let slot = self.resolve(path.as_ref().as_bytes())?;
        self.truncate_slot(slot, new_size)
    }

    /// remove `path` from the file table, its data stays in the slot
    pub fn unlink<P>(&mut self, path: P) -> FsResult<()>
    where
        P: AsRef<OsStr>,
    {
        let slot = self.resolve(path.as_ref().as_bytes())?;
        if let Some(entry) = self.files_mut().used_mut(slot) {
            info!("removing '{}' from slot {slot}", entry.name().escape_ascii());
            entry.clear();
        }
        let superblock = self.superblock_mut();
        superblock.file_count = superblock.file_count.saturating_sub(1);
        self.commit()
    }

    fn allocate(&mut self, name: &[u8], perms: u32) -> FsResult<Handle> {
        let entry = FileEntry::new(name, perms)?;
        let slot = self.files().find_free_slot()?;
        self.files_mut().occupy(slot, entry);
        self.superblock_mut().file_count += 1;
        self.commit()?;
        info!("created '{}' in slot {slot}", name.escape_ascii());
        Ok(slot as Handle)
    }

    pub(crate) fn truncate_slot(&mut self, slot: usize, new_size: u64) -> FsResult<()> {
        if new_size > self.geometry().slot_size() {
            return Err(FsError::NoSpace);
        }
        let entry = self.files_mut().used_mut(slot).ok_or(FsError::NotFound)?;
        entry.size = new_size as u32;
        entry.touch();
        self.commit()
    }

    pub(crate) fn set_perms(&mut self, slot: usize, perms: u32) -> FsResult<()> {
        let entry = self.files_mut().used_mut(slot).ok_or(FsError::NotFound)?;
        entry.perms = perms;
        self.commit()
    }

    pub(crate) fn set_mtime(&mut self, slot: usize, mtime: u32) -> FsResult<()> {
        let entry = self.files_mut().used_mut(slot).ok_or(FsError::NotFound)?;
        entry.mtime = mtime;
        self.commit()
    }
}

/// data operations on open files
impl FlatFs {
    /// read up to `size` bytes at `offset`,
    /// an empty buffer means the end of the file
    pub fn read(&self, handle: Handle, size: u32, offset: u64) -> FsResult<Vec<u8>> {
        let slot = self.slot_of(handle)?;
        let file_size = self
            .files()
            .used(slot)
            .map_or(0, |e| e.size as u64)
            .min(self.geometry().slot_size());
        if offset >= file_size {
            return Ok(Vec::new());
        }
        let len = (size as u64).min(file_size - offset) as usize;
        let mut buf = vec![0u8; len];
        self.read_from_slot(slot, offset, &mut buf)?;
        Ok(buf)
    }

    /// write all of `data` at `offset`, growing the file if it ends past its size
    /// # Return
    /// the number of bytes written, always `data.len()`
    pub fn write(&mut self, handle: Handle, data: &[u8], offset: u64) -> FsResult<u32> {
        let slot = self.slot_of(handle)?;
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|end| *end <= self.geometry().slot_size())
            .ok_or(FsError::NoSpace)?;
        self.write_to_slot(slot, offset, data)?;

        let entry = self
            .files_mut()
            .used_mut(slot)
            .ok_or(FsError::BadDescriptor(handle))?;
        // bounded by the slot size, which fits in u32
        entry.size = entry.size.max(end as u32);
        entry.touch();
        self.commit()?;
        Ok(data.len() as u32)
    }

    /// closing a file flushes nothing, every mutation is already persisted
    pub fn release(&self, handle: Handle) {
        debug!("released handle {handle}");
    }
}
