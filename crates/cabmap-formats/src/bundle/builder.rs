//! Builder for `UnityFS` archives

use binrw::io::Cursor;
use binrw::{BinWrite, Endian};
use cabmap_crypto::{ActiveKey, CipherState};

use super::blocks::{BlocksInfo, Node, StorageBlock};
use super::error::{BundleError, Result};
use super::header::{BundleHeader, CompressionType, flags};

/// Default decompressed size of one storage block
const DEFAULT_BLOCK_SIZE: usize = 0x20000;

/// Builder for bundle archives
///
/// Produces the layout [`super::BundleFile::parse`] reads: header, optional
/// cipher header, block info (at the front or the end) and the storage blocks.
///
/// # Example
///
/// ```rust
/// use cabmap_formats::bundle::{BundleBuilder, BundleFile, CompressionType};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data = BundleBuilder::new()
///     .with_compression(CompressionType::Lz4)
///     .add_file("CAB-0123", b"serialized file bytes".to_vec())
///     .build()?;
///
/// let bundle = BundleFile::parse(&data, None)?;
/// assert_eq!(bundle.entries()[0].path, "CAB-0123");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    files: Vec<(String, Vec<u8>)>,
    version: u32,
    unity_revision: String,
    compression: CompressionType,
    block_size: usize,
    blocks_info_at_end: bool,
    encryption: Option<([u8; cabmap_crypto::HEADER_SIZE], CipherState)>,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleBuilder {
    /// Create a builder for an uncompressed version 7 archive
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            version: 7,
            unity_revision: "2021.3.20f1".to_string(),
            compression: CompressionType::None,
            block_size: DEFAULT_BLOCK_SIZE,
            blocks_info_at_end: false,
            encryption: None,
        }
    }

    /// Append a file
    pub fn add_file(mut self, path: impl Into<String>, data: Vec<u8>) -> Self {
        self.files.push((path.into(), data));
        self
    }

    /// Set the archive format version (6 to 8)
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Set the engine revision string
    pub fn with_unity_revision(mut self, revision: impl Into<String>) -> Self {
        self.unity_revision = revision.into();
        self
    }

    /// Compression for both the blocks and the block info table
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Maximum decompressed size of one storage block
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Store the block info table at the end of the archive
    pub fn with_blocks_info_at_end(mut self) -> Self {
        self.blocks_info_at_end = true;
        self
    }

    /// Encrypt the archive so that `key` recovers `vector` from its cipher header
    ///
    /// LZ4 blocks are encoded with the resulting tables. `vector` must expand to
    /// an index table that is a permutation, otherwise [`Self::build`] fails.
    pub fn with_encryption(mut self, key: &ActiveKey, vector: &[u8; 16]) -> Self {
        self.encryption = Some((
            CipherState::encode_header(key, vector),
            CipherState::from_vector(vector),
        ));
        self
    }

    /// Serialize the archive
    pub fn build(self) -> Result<Vec<u8>> {
        let mut blob = Vec::new();
        let mut nodes = Vec::with_capacity(self.files.len());
        for (path, data) in &self.files {
            nodes.push(Node {
                offset: blob.len() as i64,
                size: data.len() as i64,
                flags: 4,
                path: path.clone(),
            });
            blob.extend_from_slice(data);
        }

        let lz4 = matches!(
            self.compression,
            CompressionType::Lz4 | CompressionType::Lz4Hc
        );
        let mut blocks = Vec::new();
        let mut block_data = Vec::new();
        for (index, chunk) in blob.chunks(self.block_size).enumerate() {
            let mut stored = compress(self.compression, chunk)?;
            let mut block_flags = self.compression.as_u32() as u16;

            if let (Some((_, state)), true) = (&self.encryption, lz4) {
                let size = stored.len();
                state.encrypt_block(&mut stored, size, index as u32)?;
                block_flags |= flags::BLOCK_ENCRYPTED;
            }

            blocks.push(StorageBlock {
                uncompressed_size: chunk.len() as u32,
                compressed_size: stored.len() as u32,
                flags: block_flags,
            });
            block_data.extend_from_slice(&stored);
        }

        let info = BlocksInfo {
            hash: [0; 16],
            blocks,
            nodes,
        };
        let mut info_cursor = Cursor::new(Vec::new());
        info.write_options(&mut info_cursor, Endian::Big, ())?;
        let info_bytes = info_cursor.into_inner();
        let stored_info = compress(self.compression, &info_bytes)?;

        let mut header = BundleHeader {
            version: self.version,
            unity_version: "5.x.x".to_string(),
            unity_revision: self.unity_revision,
            size: 0,
            compressed_blocks_info_size: stored_info.len() as u32,
            uncompressed_blocks_info_size: info_bytes.len() as u32,
            flags: self.compression.as_u32(),
        };
        if self.blocks_info_at_end {
            header.flags |= flags::BLOCKS_INFO_AT_END;
        }
        if self.encryption.is_some() {
            header.flags |= if header.uses_legacy_encryption_flag() {
                flags::LEGACY_ENCRYPTION
            } else {
                flags::ENCRYPTION
            };
        }

        let mut out = Cursor::new(Vec::new());
        header.write(&mut out)?;
        if let Some((cipher_header, _)) = &self.encryption {
            out.get_mut().extend_from_slice(cipher_header);
        }
        if self.version >= 7 {
            pad_to(out.get_mut(), 16);
        }
        if !self.blocks_info_at_end {
            out.get_mut().extend_from_slice(&stored_info);
        }
        out.get_mut().extend_from_slice(&block_data);
        if self.blocks_info_at_end {
            out.get_mut().extend_from_slice(&stored_info);
        }

        // Patch the total size now that it is known
        let mut bytes = out.into_inner();
        header.size = bytes.len() as i64;
        let mut patched = Cursor::new(Vec::new());
        header.write(&mut patched)?;
        let patched = patched.into_inner();
        bytes[..patched.len()].copy_from_slice(&patched);

        Ok(bytes)
    }
}

fn compress(compression: CompressionType, data: &[u8]) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lz4 | CompressionType::Lz4Hc => Ok(lz4_flex::block::compress(data)),
        other => Err(BundleError::UnsupportedCompression(other.as_u32())),
    }
}

fn pad_to(buf: &mut Vec<u8>, alignment: usize) {
    let rem = buf.len() % alignment;
    if rem != 0 {
        buf.resize(buf.len() + alignment - rem, 0);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bundle::BundleFile;
    use cabmap_crypto::KeyRegistry;
    use pretty_assertions::assert_eq;

    const VECTOR: [u8; 16] = [
        0x9A, 0xBC, 0xDE, 0xF0, 0x12, 0x34, 0x56, 0x78, 0x27, 0x18, 0x28, 0x18, 0x28, 0x45, 0x90,
        0x45,
    ];

    #[test]
    fn test_size_field_matches_length() {
        let data = BundleBuilder::new()
            .add_file("CAB-size", vec![1, 2, 3])
            .build()
            .unwrap();
        let bundle = BundleFile::parse(&data, None).unwrap();
        assert_eq!(bundle.header.size, data.len() as i64);
    }

    #[test]
    fn test_encrypted_blocks_round_trip() {
        let key = KeyRegistry::builtin().select(1).unwrap();
        let payload: Vec<u8> = (0..3000u32).map(|i| (i * 31 % 251) as u8).collect();
        let data = BundleBuilder::new()
            .with_compression(CompressionType::Lz4Hc)
            .with_block_size(700)
            .with_encryption(&key, &VECTOR)
            .add_file("CAB-enc", payload.clone())
            .build()
            .unwrap();

        let bundle = BundleFile::parse(&data, Some(&key)).unwrap();
        assert!(bundle.header.is_encrypted());
        assert!(bundle.blocks_info.blocks.iter().all(|b| b.is_encrypted()));
        assert_eq!(bundle.entries()[0].data, payload);
    }

    #[test]
    fn test_legacy_engine_encryption_flag() {
        let key = KeyRegistry::builtin().select(0).unwrap();
        let data = BundleBuilder::new()
            .with_unity_revision("2019.4.40f1")
            .with_compression(CompressionType::Lz4)
            .with_encryption(&key, &VECTOR)
            .add_file("CAB-old", b"legacy engine payload".to_vec())
            .build()
            .unwrap();

        let bundle = BundleFile::parse(&data, Some(&key)).unwrap();
        assert_eq!(bundle.header.flags & flags::ENCRYPTION, 0);
        assert_ne!(bundle.header.flags & flags::LEGACY_ENCRYPTION, 0);
        assert_eq!(bundle.entries()[0].data, b"legacy engine payload");
    }

    #[test]
    fn test_version_six_has_no_alignment() {
        let data = BundleBuilder::new()
            .with_version(6)
            .add_file("CAB-six", b"v6".to_vec())
            .build()
            .unwrap();
        let bundle = BundleFile::parse(&data, None).unwrap();
        assert_eq!(bundle.entries()[0].data, b"v6");
    }
}
