//! our flat filesystem
pub mod error;
pub mod file_entry;
pub mod file_table;
pub mod filekind;
pub mod fs_layout;
pub mod superblock;
mod file_ops;
mod fs_api_impl;
pub use error::*;
pub use file_entry::*;
pub use file_ops::{ino_to_slot, slot_to_ino, DirEntry, Handle};
pub use file_table::*;
pub use filekind::*;
pub use fs_layout::*;
pub use superblock::*;

pub const FS_MAGIC: u32 = 0xDEAD_BEEF;
pub const FS_VERSION: u32 = 1;
/// the name `FUSE` shows for this filesystem
pub const FS_NAME: &str = "flatfs";
/// default image file, relative to the working directory
pub const DEFAULT_IMAGE_PATH: &str = "filesys.db";
/// 1 MiB
pub const DEFAULT_IMAGE_SIZE: u64 = 1024 * 1024;
/// capacity of the file table
pub const MAX_FILES: usize = 64;
/// length of the name buffer, including the trailing NUL
pub const NAME_MAX_LEN: usize = 32;
pub const ROOT_INODE: u64 = 1;
/// slot `i` is exposed to the kernel as inode `i + FIRST_FILE_INODE`
pub const FIRST_FILE_INODE: u64 = 2;
/// permissions of a file created by `open(O_CREAT)`
pub const DEFAULT_FILE_PERMS: u32 = 0o644;
pub const ROOT_DIR_PERMS: u16 = 0o755;
