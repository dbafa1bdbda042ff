//! Bundle archive reader

use std::fs::File;
use std::path::Path;

use binrw::io::Cursor;
use binrw::{BinRead, BinReaderExt, Endian};
use cabmap_crypto::{ActiveKey, CipherState, HEADER_SIZE};
use memmap2::MmapOptions;
use tracing::debug;

use super::blocks::BlocksInfo;
use super::error::{BundleError, Result};
use super::header::{BundleHeader, CompressionType, SIGNATURE};

/// Block index reported for failures in the block info table itself
const BLOCKS_INFO_INDEX: u32 = u32::MAX;

/// Upper bound of the LZ4 block expansion ratio
const LZ4_MAX_RATIO: usize = 255;

/// A named file extracted from a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// Path inside the archive
    pub path: String,
    /// Decoded contents
    pub data: Vec<u8>,
}

impl BundleEntry {
    /// Final path component, which is what dependency tables refer to
    pub fn file_name(&self) -> &str {
        self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path)
    }
}

/// A fully decoded `UnityFS` archive
#[derive(Debug, Clone)]
pub struct BundleFile {
    /// Archive header
    pub header: BundleHeader,
    /// Block and directory table
    pub blocks_info: BlocksInfo,
    entries: Vec<BundleEntry>,
}

impl BundleFile {
    /// Memory-map and decode a bundle from disk
    pub fn open(path: &Path, key: Option<&ActiveKey>) -> Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(BundleError::InvalidSignature(Vec::new()));
        }

        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        debug!("Mapped {} ({} bytes)", path.display(), mmap.len());
        Self::parse(&mmap, key)
    }

    /// Decode a bundle held in memory
    ///
    /// `key` is only consulted when the archive header carries the encryption
    /// bit.
    pub fn parse(data: &[u8], key: Option<&ActiveKey>) -> Result<Self> {
        if !data.starts_with(SIGNATURE) {
            return Err(BundleError::InvalidSignature(
                data[..data.len().min(SIGNATURE.len())].to_vec(),
            ));
        }

        let mut cursor = Cursor::new(data);
        let header: BundleHeader = cursor.read_be()?;
        if !(6..=8).contains(&header.version) {
            return Err(BundleError::UnsupportedVersion(header.version));
        }

        let cipher = if header.is_encrypted() {
            let key = key.ok_or(BundleError::MissingKey)?;
            let start = cursor.position() as usize;
            let state = CipherState::derive(slice(data, start, HEADER_SIZE)?, key)?;
            cursor.set_position((start + HEADER_SIZE) as u64);
            debug!("Derived cipher tables with key {}", key.name());
            Some(state)
        } else {
            None
        };

        if header.version >= 7 {
            align(&mut cursor, 16);
        }

        let compressed_len = header.compressed_blocks_info_size as usize;
        let info_offset = if header.blocks_info_at_end() {
            data.len()
                .checked_sub(compressed_len)
                .ok_or(BundleError::Truncated {
                    offset: 0,
                    needed: compressed_len,
                    available: data.len(),
                })?
        } else {
            let offset = cursor.position() as usize;
            cursor.set_position((offset + compressed_len) as u64);
            offset
        };

        let info_bytes = decompress(
            header.compression(),
            slice(data, info_offset, compressed_len)?,
            header.uncompressed_blocks_info_size as usize,
            BLOCKS_INFO_INDEX,
        )?;
        let blocks_info = BlocksInfo::read_options(&mut Cursor::new(&info_bytes), Endian::Big, ())?;
        debug!(
            "Block info {}: {} blocks, {} nodes",
            hex::encode(blocks_info.hash),
            blocks_info.blocks.len(),
            blocks_info.nodes.len()
        );

        if header.block_info_needs_padding() {
            align(&mut cursor, 16);
        }

        let blob = read_blocks(data, cursor.position() as usize, &blocks_info, cipher.as_ref())?;

        let mut entries = Vec::with_capacity(blocks_info.nodes.len());
        for node in &blocks_info.nodes {
            let range = usize::try_from(node.offset)
                .ok()
                .zip(usize::try_from(node.size).ok())
                .and_then(|(offset, size)| Some(offset..offset.checked_add(size)?))
                .filter(|range| range.end <= blob.len())
                .ok_or_else(|| BundleError::NodeOutOfRange {
                    path: node.path.clone(),
                })?;
            entries.push(BundleEntry {
                path: node.path.clone(),
                data: blob[range].to_vec(),
            });
        }

        Ok(Self {
            header,
            blocks_info,
            entries,
        })
    }

    /// Files in directory order
    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    /// Consume the archive, keeping only its files
    pub fn into_entries(self) -> Vec<BundleEntry> {
        self.entries
    }
}

/// Decode every storage block into one contiguous buffer
fn read_blocks(
    data: &[u8],
    mut offset: usize,
    info: &BlocksInfo,
    cipher: Option<&CipherState>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    for (index, block) in info.blocks.iter().enumerate() {
        let index = index as u32;
        let size = block.compressed_size as usize;
        let mut stored = slice(data, offset, size)?.to_vec();
        offset += size;

        if block.is_encrypted() {
            let state = cipher.ok_or(BundleError::MissingKey)?;
            state.decrypt_block(&mut stored, size, index)?;
        }

        let decoded = decompress(
            block.compression(),
            &stored,
            block.uncompressed_size as usize,
            index,
        )?;
        out.extend_from_slice(&decoded);
    }

    Ok(out)
}

fn decompress(
    compression: CompressionType,
    input: &[u8],
    uncompressed_size: usize,
    index: u32,
) -> Result<Vec<u8>> {
    if uncompressed_size > max_decoded_len(compression, input.len()) {
        return Err(BundleError::BlockTooLarge {
            index,
            compressed: input.len(),
            uncompressed: uncompressed_size,
        });
    }

    let out = match compression {
        CompressionType::None => input.to_vec(),
        CompressionType::Lz4 | CompressionType::Lz4Hc => {
            lz4_flex::block::decompress(input, uncompressed_size)
                .map_err(|source| BundleError::Decompression { index, source })?
        }
        other => return Err(BundleError::UnsupportedCompression(other.as_u32())),
    };

    if out.len() != uncompressed_size {
        return Err(BundleError::SizeMismatch {
            index,
            expected: uncompressed_size,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Largest output `input_len` stored bytes can legitimately expand to
fn max_decoded_len(compression: CompressionType, input_len: usize) -> usize {
    match compression {
        CompressionType::Lz4 | CompressionType::Lz4Hc => input_len
            .saturating_mul(LZ4_MAX_RATIO)
            .saturating_add(LZ4_MAX_RATIO),
        CompressionType::None => input_len,
        _ => usize::MAX,
    }
}

fn slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(BundleError::Truncated {
            offset,
            needed: len,
            available: data.len().saturating_sub(offset),
        })
}

fn align(cursor: &mut Cursor<&[u8]>, alignment: u64) {
    let pos = cursor.position();
    let rem = pos % alignment;
    if rem != 0 {
        cursor.set_position(pos + alignment - rem);
    }
}
