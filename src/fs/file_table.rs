//! the fixed-capacity file table and slot allocation
use std::io::{Read, Write};

use crate::utils::traits::FixedRecord;

use super::{FileEntry, FsError, FsResult, Geometry, MAX_FILES};

/// strip one leading `/` from a path, leaving the bare name
pub fn bare_name(path: &[u8]) -> &[u8] {
    path.strip_prefix(b"/").unwrap_or(path)
}

/// array-backed table of [MAX_FILES] entries,
/// an entry's index is also the index of its data slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTable {
    entries: [FileEntry; MAX_FILES],
}

impl Default for FileTable {
    fn default() -> Self {
        Self {
            entries: [FileEntry::default(); MAX_FILES],
        }
    }
}

/// for serialize and deserialize
impl FileTable {
    pub fn serialize_into<W>(&self, w: &mut W) -> anyhow::Result<usize>
    where
        W: Write,
    {
        let mut written = 0;
        for entry in self.entries.iter() {
            written += entry.serialize_into(w)?;
        }
        Ok(written)
    }

    pub fn deserialize_from<R>(r: &mut R) -> anyhow::Result<Self>
    where
        R: Read,
    {
        let mut table = FileTable::default();
        for entry in table.entries.iter_mut() {
            *entry = FileEntry::deserialize_from(r)?;
        }
        Ok(table)
    }
}

/// slot allocation
impl FileTable {
    /// index of the used entry named `path`, a leading `/` is ignored
    pub fn find_by_name(&self, path: &[u8]) -> Option<usize> {
        let name = bare_name(path);
        self.entries.iter().position(|e| e.name_matches(name))
    }

    /// first unused index
    pub fn find_free_slot(&self) -> FsResult<usize> {
        self.entries
            .iter()
            .position(|e| !e.used)
            .ok_or(FsError::NoSpace)
    }

    /// one past the last used byte across all slots,
    /// `data_region_start` when nothing is stored
    pub fn high_water_mark(&self, geometry: &Geometry) -> u64 {
        self.iter_used()
            .filter(|(_, entry)| entry.size > 0)
            .map(|(slot, entry)| geometry.slot_base(slot) + entry.size as u64)
            .fold(geometry.data_region_start(), u64::max)
    }
}

/// entry access
impl FileTable {
    /// cap every size at `slot_size`
    /// # Return
    /// the slots whose size had to be cut
    pub(crate) fn clamp_sizes(&mut self, slot_size: u64) -> Vec<usize> {
        let mut clamped = Vec::new();
        for (slot, entry) in self.entries.iter_mut().enumerate() {
            if entry.used && entry.size as u64 > slot_size {
                // the slot size fits in u32 once it is below a stored size
                entry.size = slot_size as u32;
                clamped.push(slot);
            }
        }
        clamped
    }

    /// the entry at `slot` if it is in use
    pub fn used(&self, slot: usize) -> Option<&FileEntry> {
        self.entries.get(slot).filter(|e| e.used)
    }

    pub fn used_mut(&mut self, slot: usize) -> Option<&mut FileEntry> {
        self.entries.get_mut(slot).filter(|e| e.used)
    }

    /// claim `slot` for `entry`, the slot must come from [FileTable::find_free_slot]
    pub(crate) fn occupy(&mut self, slot: usize, entry: FileEntry) {
        self.entries[slot] = entry;
    }

    /// used entries in table order
    pub fn iter_used(&self) -> impl Iterator<Item = (usize, &FileEntry)> {
        self.entries.iter().enumerate().filter(|(_, e)| e.used)
    }

    pub fn used_count(&self) -> usize {
        self.entries.iter().filter(|e| e.used).count()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::DEFAULT_IMAGE_SIZE;
    use std::io::Cursor;

    fn table_with(names: &[(usize, &str, u32)]) -> FileTable {
        let mut table = FileTable::default();
        for (slot, name, size) in names {
            let mut entry = FileEntry::new(name.as_bytes(), 0o644).unwrap();
            entry.size = *size;
            table.occupy(*slot, entry);
        }
        table
    }

    #[test]
    fn test_find_by_name() {
        let table = table_with(&[(0, "a.txt", 0), (3, "b.txt", 0)]);
        assert_eq!(table.find_by_name(b"a.txt"), Some(0));
        assert_eq!(table.find_by_name(b"/b.txt"), Some(3));
        assert_eq!(table.find_by_name(b"c.txt"), None);
        // only one separator is stripped
        assert_eq!(table.find_by_name(b"//a.txt"), None);
    }

    #[test]
    fn test_find_free_slot() {
        let table = table_with(&[(0, "a", 0), (1, "b", 0), (3, "c", 0)]);
        assert_eq!(table.find_free_slot().unwrap(), 2);

        let mut full = FileTable::default();
        for slot in 0..MAX_FILES {
            full.occupy(slot, FileEntry::new(format!("f{slot}").as_bytes(), 0).unwrap());
        }
        assert!(matches!(full.find_free_slot(), Err(FsError::NoSpace)));
    }

    #[test]
    fn test_high_water_mark() {
        let geometry = Geometry::new(DEFAULT_IMAGE_SIZE).unwrap();
        let empty = FileTable::default();
        assert_eq!(empty.high_water_mark(&geometry), geometry.data_region_start());

        let table = table_with(&[(0, "a", 100), (2, "b", 5), (1, "c", 0)]);
        assert_eq!(table.high_water_mark(&geometry), geometry.slot_base(2) + 5);

        // empty files store no byte, wherever their slot is
        let table = table_with(&[(0, "a", 10), (7, "empty", 0)]);
        assert_eq!(table.high_water_mark(&geometry), geometry.slot_base(0) + 10);
        let table = table_with(&[(1, "b", 0)]);
        assert_eq!(table.high_water_mark(&geometry), geometry.data_region_start());
    }

    #[test]
    fn test_clamp_sizes() {
        let mut table = table_with(&[(0, "fits", 100), (2, "over", 20000), (4, "exact", 16334)]);
        assert_eq!(table.clamp_sizes(16334), vec![2]);
        assert_eq!(table.used(0).unwrap().size, 100);
        assert_eq!(table.used(2).unwrap().size, 16334);
        assert_eq!(table.used(4).unwrap().size, 16334);
        assert!(table.clamp_sizes(16334).is_empty());
    }

    #[test]
    fn test_table_serialization() -> anyhow::Result<()> {
        let table = table_with(&[(5, "five", 12)]);
        let mut cursor = Cursor::new(Vec::new());
        let written = table.serialize_into(&mut cursor)?;
        assert_eq!(written, FileEntry::SIZE * MAX_FILES);
        cursor.set_position(0);
        let decoded = FileTable::deserialize_from(&mut cursor)?;
        assert_eq!(decoded, table);
        assert_eq!(decoded.used_count(), 1);
        Ok(())
    }
}
