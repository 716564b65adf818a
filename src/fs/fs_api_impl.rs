use std::{ffi::OsStr, os::unix::prelude::OsStrExt, time::Duration};

use crate::utils::time_util;

use super::{
    file_ops::{ino_to_slot, DirEntry, Handle},
    FlatFs, FsError, MAX_FILES, NAME_MAX_LEN, ROOT_INODE,
};

use fuser::{Filesystem, TimeOrNow};

use log::{error, info};

/// nothing is cached by the kernel, every request reaches us
const TTL: Duration = Duration::new(0, 0);

/// turn an error into the errno to reply with,
/// a metadata failure leaves nothing to reply for and ends the process
fn errno(err: FsError) -> libc::c_int {
    if err.is_fatal() {
        error!("{err}, the image can no longer be trusted, exiting");
        std::process::exit(1);
    }
    info!("replying with error: {err}");
    err.errno()
}

impl FlatFs {
    /// the stored name of the file behind `ino`
    fn name_of(&self, ino: u64) -> Result<Vec<u8>, FsError> {
        ino_to_slot(ino)
            .and_then(|slot| self.files().used(slot))
            .map(|entry| entry.name().to_vec())
            .ok_or(FsError::NotFound)
    }

    fn attr_of(&self, ino: u64) -> Result<fuser::FileAttr, FsError> {
        if ino == ROOT_INODE {
            return Ok(self.root_attr());
        }
        self.slot_attr(ino_to_slot(ino).ok_or(FsError::NotFound)?)
    }

    /// the root directory entries past `offset`,
    /// each with the offset the kernel passes back to resume after it
    fn dir_entries_from(&self, offset: i64) -> Result<Vec<(i64, DirEntry)>, FsError> {
        let skip = usize::try_from(offset).map_err(|_| FsError::InvalidArgument)?;
        Ok(self
            .list("/")?
            .into_iter()
            .enumerate()
            .skip(skip)
            .map(|(index, entry)| (index as i64 + 1, entry))
            .collect())
    }

    fn apply_setattr(
        &mut self,
        ino: u64,
        mode: Option<u32>,
        size: Option<u64>,
        mtime: Option<TimeOrNow>,
    ) -> Result<fuser::FileAttr, FsError> {
        if ino == ROOT_INODE {
            // the root directory has nothing stored to change
            return Ok(self.root_attr());
        }
        let slot = ino_to_slot(ino).ok_or(FsError::NotFound)?;
        if let Some(size) = size {
            self.truncate_slot(slot, size)?;
        }
        if let Some(mode) = mode {
            self.set_perms(slot, mode)?;
        }
        if let Some(mtime) = mtime {
            let mtime = match mtime {
                TimeOrNow::SpecificTime(time) => {
                    time_util::from_system_time(time).map_err(|_| FsError::InvalidArgument)?
                }
                TimeOrNow::Now => time_util::now(),
            };
            self.set_mtime(slot, mtime)?;
        }
        self.slot_attr(slot)
    }
}

impl Filesystem for FlatFs {
    // to init the filesystem
    fn init(
        &mut self,
        _req: &fuser::Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        info!(
            "init() called, {} files, {} bytes used",
            self.superblock().file_count,
            self.superblock().last_alloc
        );
        Ok(())
    }

    // to umount the filesystem
    fn destroy(&mut self) {
        info!("destroy() called");
        if let Err(e) = self.persist() {
            error!("failed to persist metadata on unmount: {e:#}");
        }
    }

    // to show FS information, counted in slots
    fn statfs(&mut self, _req: &fuser::Request<'_>, _ino: u64, reply: fuser::ReplyStatfs) {
        info!("statfs() called");
        let total = MAX_FILES as u64;
        let free = total.saturating_sub(self.superblock().file_count as u64);
        let slot_size = self.geometry().slot_size() as u32;
        reply.statfs(
            total,
            free,
            free,
            total,
            free,
            slot_size,
            (NAME_MAX_LEN - 1) as u32,
            slot_size,
        )
    }

    // to look up a file
    fn lookup(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        info!("lookup() called with parent inode number: {parent} and name: {name:?}");
        if parent != ROOT_INODE {
            reply.error(libc::ENOENT);
            return;
        }
        match FlatFs::lookup(self, name) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn getattr(&mut self, _req: &fuser::Request<'_>, ino: u64, reply: fuser::ReplyAttr) {
        info!("getattr() called with inode number: {:?}", ino);
        match self.attr_of(ino) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(errno(e)),
        }
    }

    // to truncate a file, change its mode or its modification time
    fn setattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<fuser::TimeOrNow>,
        mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<std::time::SystemTime>,
        fh: Option<u64>,
        _crtime: Option<std::time::SystemTime>,
        _chgtime: Option<std::time::SystemTime>,
        _bkuptime: Option<std::time::SystemTime>,
        _flags: Option<u32>,
        reply: fuser::ReplyAttr,
    ) {
        info!(
            "setattr() called with inode number: {:?}, mode: {:?}, uid: {:?}, gid: {:?}, size: {:?}, atime: {:?}, mtime: {:?}, fh: {:?}",
            ino, mode, uid, gid, size, atime, mtime, fh
        );
        // only one timestamp is stored, an atime change alone is accepted and dropped
        match self.apply_setattr(ino, mode, size, mtime) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn opendir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _flags: i32,
        reply: fuser::ReplyOpen,
    ) {
        info!("opendir() called with inode number: {ino}");
        if ino == ROOT_INODE {
            reply.opened(0, 0);
        } else {
            reply.error(libc::ENOTDIR);
        }
    }

    // to read a dir
    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: fuser::ReplyDirectory,
    ) {
        info!("readdir() called with inode number: {ino}, offset: {offset}");
        if ino != ROOT_INODE {
            reply.error(if self.attr_of(ino).is_ok() {
                libc::ENOTDIR
            } else {
                libc::ENOENT
            });
            return;
        }
        let entries = match self.dir_entries_from(offset) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(errno(e));
                return;
            }
        };
        for (next, entry) in entries {
            let buffer_full: bool = reply.add(entry.ino, next, entry.kind.into(), &entry.name);
            if buffer_full {
                break;
            }
        }
        reply.ok();
    }

    // to open a file, `O_CREAT` and `O_TRUNC` are honoured
    fn open(&mut self, _req: &fuser::Request<'_>, ino: u64, flags: i32, reply: fuser::ReplyOpen) {
        info!("open() called with inode number: {ino}, flags: {flags:#o}");
        let result = self.name_of(ino).and_then(|name| {
            FlatFs::open(
                self,
                OsStr::from_bytes(&name),
                flags & libc::O_CREAT != 0,
                flags & libc::O_TRUNC != 0,
            )
        });
        match result {
            Ok(handle) => reply.opened(handle, 0),
            Err(e) => reply.error(errno(e)),
        }
    }

    // to create a new file
    fn create(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        info!(
            "create() called with parent inode number: {parent}, name: {name:?}, mode: {mode:#o}, umask: {umask:#o}, flags: {flags:#o}"
        );
        if parent != ROOT_INODE {
            reply.error(libc::ENOENT);
            return;
        }
        let result = FlatFs::create(self, name, mode)
            .and_then(|handle| Ok((handle, FlatFs::lookup(self, name)?)));
        match result {
            Ok((handle, attr)) => reply.created(&TTL, &attr, 0, handle, 0),
            Err(e) => reply.error(errno(e)),
        }
    }

    // to read from a file
    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        flags: i32,
        lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        info!(
            "read() called with inode number: {:?}, fh: {:?}, offset: {:?}, size: {:?}, flags: {:?}, lock_owner: {:?}",
            ino, fh, offset, size, flags, lock_owner
        );
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match FlatFs::read(self, fh as Handle, size, offset as u64) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(errno(e)),
        }
    }

    // to write to a file
    fn write(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        write_flags: u32,
        flags: i32,
        lock_owner: Option<u64>,
        reply: fuser::ReplyWrite,
    ) {
        info!(
            "write() called with inode number: {:?}, fh: {:?}, offset: {:?}, len: {:?}, write_flags: {:?}, flags: {:?}, lock_owner: {:?}",
            ino, fh, offset, data.len(), write_flags, flags, lock_owner
        );
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match FlatFs::write(self, fh as Handle, data, offset as u64) {
            Ok(written) => reply.written(written),
            Err(e) => reply.error(errno(e)),
        }
    }

    // to delete a file
    fn unlink(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEmpty,
    ) {
        info!("unlink() called with parent inode number: {parent} and name: {name:?}");
        if parent != ROOT_INODE {
            reply.error(libc::ENOENT);
            return;
        }
        match FlatFs::unlink(self, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn release(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        info!("release() called with inode number: {ino}, fh: {fh}");
        FlatFs::release(self, fh);
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{slot_to_ino, FileKind},
        utils::init_test_environment::init_test_environment,
    };
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_setattr_size() {
        let (_dir, mut fs) = init_test_environment();
        let handle = fs.create("/s", 0o644).unwrap();
        fs.write(handle, b"0123456789", 0).unwrap();
        let ino = slot_to_ino(handle as usize);

        let attr = fs.apply_setattr(ino, None, Some(4), None).unwrap();
        assert_eq!(attr.size, 4);
        assert_eq!(fs.read(handle, 100, 0).unwrap(), b"0123");

        let slot_size = fs.geometry().slot_size();
        assert!(matches!(
            fs.apply_setattr(ino, None, Some(slot_size + 1), None),
            Err(FsError::NoSpace)
        ));
        assert_eq!(fs.attr_of(ino).unwrap().size, 4);
    }

    #[test]
    fn test_setattr_mode() {
        let (_dir, mut fs) = init_test_environment();
        let handle = fs.create("/m", 0o644).unwrap();
        let ino = slot_to_ino(handle as usize);

        let attr = fs
            .apply_setattr(ino, Some(libc::S_IFREG | 0o600), None, None)
            .unwrap();
        assert_eq!(attr.perm, 0o600);
        assert_eq!(attr.kind, fuser::FileType::RegularFile);
        // stored as given, masked when reported
        assert_eq!(
            fs.files().used(handle as usize).unwrap().perms,
            libc::S_IFREG | 0o600
        );
    }

    #[test]
    fn test_setattr_mtime() {
        let (_dir, mut fs) = init_test_environment();
        let handle = fs.create("/t", 0o644).unwrap();
        let ino = slot_to_ino(handle as usize);

        let then = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let attr = fs
            .apply_setattr(ino, None, None, Some(TimeOrNow::SpecificTime(then)))
            .unwrap();
        assert_eq!(attr.mtime, then);
        assert_eq!(attr.atime, then);
        assert_eq!(fs.files().used(handle as usize).unwrap().mtime, 1_600_000_000);

        let before = time_util::now();
        fs.apply_setattr(ino, None, None, Some(TimeOrNow::Now))
            .unwrap();
        assert!(fs.files().used(handle as usize).unwrap().mtime >= before);

        let too_early = UNIX_EPOCH - Duration::from_secs(1);
        assert!(matches!(
            fs.apply_setattr(ino, None, None, Some(TimeOrNow::SpecificTime(too_early))),
            Err(FsError::InvalidArgument)
        ));
    }

    #[test]
    fn test_setattr_without_stored_changes() {
        let (_dir, mut fs) = init_test_environment();
        let handle = fs.create("/a", 0o640).unwrap();
        fs.write(handle, b"abc", 0).unwrap();
        let ino = slot_to_ino(handle as usize);
        let before = fs.attr_of(ino).unwrap();

        // an atime-only change reaches us with nothing we store
        let after = fs.apply_setattr(ino, None, None, None).unwrap();
        assert_eq!(after.size, before.size);
        assert_eq!(after.perm, before.perm);
        assert_eq!(after.mtime, before.mtime);

        let root = fs
            .apply_setattr(ROOT_INODE, Some(0o700), Some(0), None)
            .unwrap();
        assert_eq!(root.perm, 0o755);
        assert_eq!(root.kind, fuser::FileType::Directory);
    }

    #[test]
    fn test_setattr_unknown_inode() {
        let (_dir, mut fs) = init_test_environment();
        assert!(matches!(
            fs.apply_setattr(slot_to_ino(5), None, Some(0), None),
            Err(FsError::NotFound)
        ));
        assert!(matches!(
            fs.apply_setattr(999, Some(0o600), None, None),
            Err(FsError::NotFound)
        ));
    }

    #[test]
    fn test_inode_resolution() {
        let (_dir, mut fs) = init_test_environment();
        let handle = fs.create("/named", 0o644).unwrap();
        let ino = slot_to_ino(handle as usize);

        assert_eq!(fs.name_of(ino).unwrap(), b"named");
        assert_eq!(fs.attr_of(ino).unwrap().ino, ino);
        assert_eq!(fs.attr_of(ROOT_INODE).unwrap().kind, fuser::FileType::Directory);
        assert!(matches!(fs.name_of(ROOT_INODE), Err(FsError::NotFound)));

        fs.unlink("/named").unwrap();
        assert!(matches!(fs.name_of(ino), Err(FsError::NotFound)));
        assert!(matches!(fs.attr_of(ino), Err(FsError::NotFound)));

        let past_the_table = slot_to_ino(MAX_FILES);
        assert!(matches!(fs.name_of(past_the_table), Err(FsError::NotFound)));
        assert!(matches!(fs.attr_of(past_the_table), Err(FsError::NotFound)));
        assert!(matches!(fs.attr_of(0), Err(FsError::NotFound)));
    }

    #[test]
    fn test_readdir_resumes_at_offset() {
        let (_dir, mut fs) = init_test_environment();
        for name in ["/x", "/y", "/z"] {
            fs.create(name, 0o644).unwrap();
        }

        let all = fs.dir_entries_from(0).unwrap();
        let offsets: Vec<i64> = all.iter().map(|(next, _)| *next).collect();
        assert_eq!(offsets, [1, 2, 3, 4, 5]);
        assert_eq!(all[0].1.kind, FileKind::Directory);

        // the kernel hands back the offset of the last entry it took
        let rest = fs.dir_entries_from(all[2].0).unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].1.name, "y");
        assert_eq!(rest[0].0, 4);
        assert_eq!(rest[1].1.name, "z");

        assert!(fs.dir_entries_from(5).unwrap().is_empty());
        assert!(fs.dir_entries_from(100).unwrap().is_empty());
        assert!(matches!(
            fs.dir_entries_from(-1),
            Err(FsError::InvalidArgument)
        ));
    }
}
