//! what does our filesystem look like in the memory

use crate::utils::{
    fs_size_calculator::{self, metadata_size},
    traits::FixedRecord,
};

use super::{superblock::SuperBlock, FileTable, FsError, FsResult, MAX_FILES};
use anyhow::{anyhow, bail, Context};
use byte_unit::Byte;
use log::{info, warn};
use memmap2::MmapMut;
use std::{
    fmt,
    fs::OpenOptions,
    io::{Cursor, ErrorKind, Read, Seek, SeekFrom, Write},
    path::Path,
};

/// sizes derived from the image size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    total_size: u64,
    slot_size: u64,
}

impl Geometry {
    /// # Params
    /// - `total_size`: the size of the image file
    /// # Return
    /// an error if the image can't give every slot at least one byte,
    /// or if it is too large for the 32-bit offsets stored on disk
    pub fn new(total_size: u64) -> anyhow::Result<Self> {
        if total_size > u32::MAX as u64 {
            bail!(
                "image size must not exceed {}",
                Byte::from_bytes(u32::MAX as _).get_appropriate_unit(true)
            );
        }
        let slot_size = fs_size_calculator::slot_size(total_size, MAX_FILES);
        if slot_size == 0 {
            let space_needed = metadata_size(MAX_FILES) + MAX_FILES as u64;
            bail!(
                "image size must be at least {} for {} files",
                Byte::from_bytes(space_needed as _).get_appropriate_unit(true),
                MAX_FILES
            );
        }
        Ok(Self {
            total_size,
            slot_size,
        })
    }

    #[inline]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// the capacity of every slot, and so the maximum file size
    #[inline]
    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    /// the size of superblock and file table
    #[inline]
    pub fn data_region_start(&self) -> u64 {
        metadata_size(MAX_FILES)
    }

    /// where the data of `slot` begins, whether the slot is used or not
    #[inline]
    pub fn slot_base(&self, slot: usize) -> u64 {
        self.data_region_start() + slot as u64 * self.slot_size
    }
}

/// why the image at hand could not be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReformatReason {
    Missing,
    WrongSize { expected: u64, found: u64 },
    BadMagic { found: u32 },
}

impl fmt::Display for ReformatReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReformatReason::Missing => write!(f, "image file not found"),
            ReformatReason::WrongSize { expected, found } => write!(
                f,
                "image file has {found} bytes instead of {expected}"
            ),
            ReformatReason::BadMagic { found } => {
                write!(f, "image file magic number is {found:#x}, not a flatfs image")
            }
        }
    }
}

/// what to do with an image that exists but can't be loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReformatPolicy {
    /// discard it and format a new filesystem
    #[default]
    Reformat,
    /// fail the bootstrap
    Refuse,
}

/// how the bootstrap obtained the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Loaded,
    Formatted(ReformatReason),
}

enum Probe {
    Valid(FlatFs),
    Invalid(ReformatReason),
}

/// it has the following layout:
/// - superblock
/// - file table, [MAX_FILES] entries
/// - data region, one fixed-size slot per file table entry
///
/// This is the only copy of the metadata, the image is rewritten from it
/// after every mutation. It is not synchronized: callers must serialize
/// operations, which `fuser` does by dispatching through `&mut self`.
#[derive(Debug)]
pub struct FlatFs {
    geometry: Geometry,
    superblock: SuperBlock,
    files: FileTable,
    /// the whole image file
    image: MmapMut,
    /// owner reported for every file
    uid: u32,
    gid: u32,
}

/// bootstrap
impl FlatFs {
    /// load the filesystem in `image_path`, formatting a new one
    /// if there is none or if it can't be recognized
    /// # Params
    /// - `image_path`: the path of the image file
    /// - `geometry`: the expected image size
    /// - `policy`: whether an unrecognized image may be discarded
    /// # Return
    /// an [anyhow::Result] type,
    /// which contains a [FlatFs] instance and how it was obtained
    pub fn open_or_format<P>(
        image_path: P,
        geometry: Geometry,
        policy: ReformatPolicy,
    ) -> anyhow::Result<(Self, Bootstrap)>
    where
        P: AsRef<Path>,
    {
        let image_path = image_path.as_ref();
        let reason = match Self::probe(image_path, geometry)? {
            Probe::Valid(fs) => {
                info!("loaded filesystem from {image_path:?}");
                return Ok((fs, Bootstrap::Loaded));
            }
            Probe::Invalid(reason) => reason,
        };

        match reason {
            ReformatReason::Missing => {
                info!("{reason}, creating a new filesystem at {image_path:?}");
            }
            _ if policy == ReformatPolicy::Refuse => {
                bail!("{reason}, refusing to reformat {image_path:?}");
            }
            _ => {
                warn!("{reason}, REFORMATTING {image_path:?}: its previous contents are lost");
            }
        }
        let fs = Self::format(image_path, geometry)?;
        Ok((fs, Bootstrap::Formatted(reason)))
    }

    /// load an existing filesystem, failing if it is missing or unrecognized
    pub fn load<P>(image_path: P, geometry: Geometry) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let image_path = image_path.as_ref();
        match Self::probe(image_path, geometry)? {
            Probe::Valid(fs) => Ok(fs),
            Probe::Invalid(reason) => Err(anyhow!("can't load {image_path:?}: {reason}")),
        }
    }

    /// create a new filesystem, overwriting whatever is at `image_path`
    pub fn format<P>(image_path: P, geometry: Geometry) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let image_path = image_path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(image_path)
            .with_context(|| format!("failed to create image file {image_path:?}"))?;

        // grow the file to its full size by writing its last byte
        file.seek(SeekFrom::Start(geometry.total_size() - 1))
            .context("failed to seek when sizing the image file")?;
        file.write_all(&[0])
            .context("failed to write when sizing the image file")?;
        file.flush()?;

        // Safety
        // the image file is owned by this process for as long as it is mounted,
        // nothing else is expected to truncate it under the mapping
        let image = unsafe { MmapMut::map_mut(&file)? };
        let superblock = SuperBlock::new(geometry.data_region_start() as u32);
        let mut fs = Self::from_parts(geometry, superblock, FileTable::default(), image);
        fs.persist()?;
        info!(
            "formatted {image_path:?}: {} files of at most {} bytes",
            MAX_FILES,
            geometry.slot_size()
        );
        Ok(fs)
    }

    fn probe(image_path: &Path, geometry: Geometry) -> anyhow::Result<Probe> {
        // open the "device" for read and write
        let file = match OpenOptions::new().read(true).write(true).open(image_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Probe::Invalid(ReformatReason::Missing))
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to open image file {image_path:?}"))
            }
        };

        let found = file.metadata()?.len();
        if found != geometry.total_size() {
            return Ok(Probe::Invalid(ReformatReason::WrongSize {
                expected: geometry.total_size(),
                found,
            }));
        }

        // Safety: see `format`
        let image = unsafe { MmapMut::map_mut(&file)? };
        let mut cursor = Cursor::new(&image[..]);
        let superblock =
            SuperBlock::deserialize_from(&mut cursor).context("failed to read superblock")?;
        if !superblock.has_valid_magic() {
            return Ok(Probe::Invalid(ReformatReason::BadMagic {
                found: superblock.magic,
            }));
        }
        let mut files =
            FileTable::deserialize_from(&mut cursor).context("failed to read file table")?;
        let clamped = files.clamp_sizes(geometry.slot_size());
        if !clamped.is_empty() {
            warn!(
                "file sizes in slots {clamped:?} exceed the slot size of {} bytes, clamped",
                geometry.slot_size()
            );
        }
        if superblock.file_count as usize != files.used_count() {
            warn!(
                "superblock counts {} files but the file table holds {}",
                superblock.file_count,
                files.used_count()
            );
        }
        let mut fs = Self::from_parts(geometry, superblock, files, image);
        if !clamped.is_empty() {
            fs.recompute_last_alloc();
        }
        Ok(Probe::Valid(fs))
    }

    fn from_parts(
        geometry: Geometry,
        superblock: SuperBlock,
        files: FileTable,
        image: MmapMut,
    ) -> Self {
        FlatFs {
            geometry,
            superblock,
            files,
            image,
            uid: users::get_effective_uid(),
            gid: users::get_effective_gid(),
        }
    }
}

/// get [SuperBlock], [FileTable] and [Geometry] of this filesystem
impl FlatFs {
    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub(crate) fn superblock_mut(&mut self) -> &mut SuperBlock {
        &mut self.superblock
    }

    #[inline]
    pub fn files(&self) -> &FileTable {
        &self.files
    }

    #[inline]
    pub(crate) fn files_mut(&mut self) -> &mut FileTable {
        &mut self.files
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn owner(&self) -> (u32, u32) {
        (self.uid, self.gid)
    }
}

/// metadata persistence
impl FlatFs {
    /// write superblock and file table back to the image and flush it
    pub fn persist(&mut self) -> anyhow::Result<()> {
        let mut cursor = Cursor::new(&mut self.image[..]);
        self.superblock
            .serialize_into(&mut cursor)
            .context("failed to write superblock")?;
        self.files
            .serialize_into(&mut cursor)
            .context("failed to write file table")?;
        self.image.flush().context("failed to flush image file")
    }

    /// recompute `last_alloc` from the file table
    pub(crate) fn recompute_last_alloc(&mut self) {
        // fits, the image size is bounded by `u32::MAX`
        self.superblock.last_alloc = self.files.high_water_mark(&self.geometry) as u32;
    }

    /// finish a mutation: refresh derived counters and persist
    pub(crate) fn commit(&mut self) -> FsResult<()> {
        self.recompute_last_alloc();
        self.persist().map_err(FsError::Metadata)
    }
}

/// read and write data in the slots
impl FlatFs {
    pub(crate) fn read_from_slot(&self, slot: usize, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        let mut cursor = Cursor::new(&self.image[..]);
        cursor.seek(SeekFrom::Start(self.geometry.slot_base(slot) + offset))?;
        cursor.read_exact(buf)?;
        Ok(())
    }

    pub(crate) fn write_to_slot(&mut self, slot: usize, offset: u64, data: &[u8]) -> FsResult<()> {
        let position = self.geometry.slot_base(slot) + offset;
        let mut cursor = Cursor::new(&mut self.image[..]);
        cursor.seek(SeekFrom::Start(position))?;
        cursor.write_all(data)?;
        Ok(())
    }
}
