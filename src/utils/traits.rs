use std::io::{Read, Write};

use serde::{de::DeserializeOwned, Serialize};

/// Trait for serializing and deserializing a fixed-size on-disk record
/// # Note
/// Records are encoded with the `legacy` [bincode] configuration:
/// little-endian fixed-width integers and no length prefix for arrays,
/// so every record of a type occupies exactly [FixedRecord::SIZE] bytes.
pub trait FixedRecord: Serialize + DeserializeOwned {
    /// encoded size in bytes
    const SIZE: usize;

    /// serialize into a writer implementing [Write](std::io::Write)
    /// # Returns
    /// The number of bytes written if successful
    fn serialize_into<W>(&self, w: &mut W) -> anyhow::Result<usize>
    where
        W: Write,
    {
        let config = bincode::config::legacy();
        bincode::serde::encode_into_std_write(self, w, config).map_err(|e| e.into())
    }

    /// serialize into a [Vec](std::vec::Vec)
    fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        let config = bincode::config::legacy();
        bincode::serde::encode_to_vec(self, config).map_err(|e| e.into())
    }

    /// deserialize from a reader implementing [Read](std::io::Read)
    /// # Returns
    /// The deserialized record if successful
    fn deserialize_from<R>(r: &mut R) -> anyhow::Result<Self>
    where
        R: Read,
    {
        let config = bincode::config::legacy();
        Ok(bincode::serde::decode_from_std_read(r, config)?)
    }
}
