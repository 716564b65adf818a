use serde::{Deserialize, Serialize};

use crate::utils::{fs_size_calculator::SUPERBLOCK_SIZE, traits::FixedRecord};

use super::{FS_MAGIC, FS_VERSION};

/// The superblock of this filesystem
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u32,
    pub version: u32,
    /// byte offset one past the highest used byte across all slots,
    /// informational only
    pub last_alloc: u32,
    /// number of used file table entries
    pub file_count: u32,
}

impl SuperBlock {
    /// a superblock describing an empty filesystem
    /// whose data region starts at `data_region_start`
    pub fn new(data_region_start: u32) -> Self {
        Self {
            magic: FS_MAGIC,
            version: FS_VERSION,
            last_alloc: data_region_start,
            file_count: 0,
        }
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == FS_MAGIC
    }
}

impl FixedRecord for SuperBlock {
    const SIZE: usize = SUPERBLOCK_SIZE as usize;
}
