//! Serialized file header

use binrw::Endian;

use super::error::{Result, SerializedError};
use super::stream::StreamReader;

/// Oldest format version with the endianness flag in the header
pub const MIN_VERSION: u32 = 9;

/// First format version with 64-bit sizes in the header
pub const LARGE_FILES_VERSION: u32 = 22;

/// Header length for versions before [`LARGE_FILES_VERSION`]
pub const HEADER_SIZE: u64 = 20;

/// Header length from [`LARGE_FILES_VERSION`] on
pub const LARGE_HEADER_SIZE: u64 = 48;

/// Big-endian header preceding the metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializedHeader {
    /// Size of the metadata section
    pub metadata_size: u32,
    /// Declared file size
    pub file_size: i64,
    /// Format version
    pub version: u32,
    /// Offset of the object data
    pub data_offset: i64,
    /// Byte order of the metadata and object data
    pub big_endian: bool,
}

impl SerializedHeader {
    /// Read the header from the start of `reader`
    pub fn read(reader: &mut StreamReader<'_>) -> Result<Self> {
        reader.set_position(0);
        reader.set_endian(Endian::Big);

        let mut metadata_size = reader.u32()?;
        let mut file_size = i64::from(reader.u32()?);
        let version = reader.u32()?;
        let mut data_offset = i64::from(reader.u32()?);

        if version < MIN_VERSION {
            return Err(SerializedError::UnsupportedVersion(version));
        }

        let big_endian = reader.u8()? != 0;
        reader.skip(3)?;

        if version >= LARGE_FILES_VERSION {
            metadata_size = reader.u32()?;
            file_size = reader.i64()?;
            data_offset = reader.i64()?;
            reader.i64()?;
        }

        Ok(Self {
            metadata_size,
            file_size,
            version,
            data_offset,
            big_endian,
        })
    }

    /// Byte order for everything after the header
    pub fn endian(&self) -> Endian {
        if self.big_endian {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    /// Check that the header describes a file of exactly `len` bytes
    pub fn matches_length(&self, len: usize) -> bool {
        self.file_size == len as i64 && self.data_offset >= 0 && self.data_offset <= self.file_size
    }
}

/// Check whether `data` is a serialized file
///
/// Bundles also carry resource streams (`.resS`, `.resource`) that have no
/// header at all; those fail the size check.
pub fn is_serialized_file(data: &[u8]) -> bool {
    if (data.len() as u64) < HEADER_SIZE {
        return false;
    }
    let mut reader = StreamReader::new(data, Endian::Big);
    SerializedHeader::read(&mut reader).is_ok_and(|header| header.matches_length(data.len()))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::serialized::stream::StreamWriter;

    fn legacy_header(file_size: u32, version: u32, data_offset: u32) -> Vec<u8> {
        let mut writer = StreamWriter::new(Endian::Big);
        writer.u32(0);
        writer.u32(file_size);
        writer.u32(version);
        writer.u32(data_offset);
        writer.u8(0);
        writer.bytes(&[0; 3]);
        writer.into_inner()
    }

    #[test]
    fn test_detects_matching_length() {
        let mut data = legacy_header(64, 17, 20);
        data.resize(64, 0);
        assert!(is_serialized_file(&data));

        let header = SerializedHeader::read(&mut StreamReader::new(&data, Endian::Big)).unwrap();
        assert_eq!(header.version, 17);
        assert_eq!(header.endian(), Endian::Little);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let mut data = legacy_header(100, 17, 20);
        data.resize(64, 0);
        assert!(!is_serialized_file(&data));
    }

    #[test]
    fn test_rejects_data_offset_past_end() {
        let mut data = legacy_header(64, 17, 80);
        data.resize(64, 0);
        assert!(!is_serialized_file(&data));
    }

    #[test]
    fn test_rejects_short_and_old() {
        assert!(!is_serialized_file(b"tiny"));

        let mut data = legacy_header(64, 8, 20);
        data.resize(64, 0);
        assert!(!is_serialized_file(&data));
    }
}
