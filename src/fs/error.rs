use libc::c_int;
use thiserror::Error;

/// errors reported by filesystem operations
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file")]
    NotFound,
    #[error("no space left: file table full or slot capacity exceeded")]
    NoSpace,
    #[error("not a directory")]
    NotADirectory,
    #[error("bad file handle {0}")]
    BadDescriptor(u64),
    #[error("file name longer than {0} bytes")]
    NameTooLong(usize),
    #[error("invalid argument")]
    InvalidArgument,
    #[error("I/O error on the data region: {0}")]
    Io(#[from] std::io::Error),
    /// the metadata block could not be written or read,
    /// the in-memory state can no longer be trusted to match the image
    #[error("metadata I/O failed: {0:#}")]
    Metadata(#[source] anyhow::Error),
}

impl FsError {
    /// the errno to reply with
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::NoSpace => libc::ENOSPC,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::BadDescriptor(_) => libc::EBADF,
            FsError::NameTooLong(_) => libc::ENAMETOOLONG,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::Io(_) | FsError::Metadata(_) => libc::EIO,
        }
    }

    /// whether the process must stop instead of replying
    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::Metadata(_))
    }
}

pub type FsResult<T> = Result<T, FsError>;
