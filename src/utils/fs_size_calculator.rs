//! This module contains functions to calculate the size of different fs components

/// encoded size of the superblock: magic, version, last_alloc, file_count
pub const SUPERBLOCK_SIZE: u64 = 4 * 4;

/// encoded size of a file table entry: used flag, name buffer, start, size, perms, mtime
pub const FILE_ENTRY_SIZE: u64 = 1 + crate::fs::NAME_MAX_LEN as u64 + 4 * 4;

/// calculate the size of the metadata block (superblock and file table)
/// # Arguments
/// - `max_files`: the capacity of the file table
/// # Return
/// the byte offset where the data region starts
/// # Example
/// ```
/// use flatfs::utils::fs_size_calculator::metadata_size;
/// assert_eq!(metadata_size(64), 3152);
/// ```
pub const fn metadata_size(max_files: usize) -> u64 {
    SUPERBLOCK_SIZE + FILE_ENTRY_SIZE * max_files as u64
}

/// calculate the capacity of every slot in the data region
/// # Arguments
/// - `total_size`: the size of the image file
/// - `max_files`: the capacity of the file table
/// # Return
/// the slot size, or `0` if the image can't even hold the metadata
/// # Example
/// ```
/// use flatfs::utils::fs_size_calculator::slot_size;
/// assert_eq!(slot_size(1024 * 1024, 64), 16334);
/// assert_eq!(slot_size(1024, 64), 0);
/// ```
pub const fn slot_size(total_size: u64, max_files: usize) -> u64 {
    let metadata = metadata_size(max_files);
    if total_size <= metadata {
        return 0;
    }
    (total_size - metadata) / max_files as u64
}
