//! Block info table: storage blocks and directory nodes

use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite, Endian, NullString};

use super::header::{CompressionType, flags};

/// One compressed storage block
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct StorageBlock {
    /// Size once decompressed
    pub uncompressed_size: u32,
    /// Stored size
    pub compressed_size: u32,
    /// Compression in the low bits, encryption at `0x100`
    pub flags: u16,
}

impl StorageBlock {
    /// Compression scheme of this block
    pub fn compression(&self) -> CompressionType {
        CompressionType::from_flags(u32::from(self.flags))
    }

    /// Check if the block passes through the cipher before decompression
    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::BLOCK_ENCRYPTED != 0
    }
}

/// A file inside the archive, addressed in decompressed block space
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct Node {
    /// Offset into the concatenated decompressed blocks
    pub offset: i64,
    /// Size in bytes
    pub size: i64,
    /// Node flags
    pub flags: u32,
    /// Path inside the archive, e.g. `CAB-0123abcd`
    #[br(map = |s: NullString| s.to_string())]
    #[bw(map = |s: &String| NullString::from(s.as_str()))]
    pub path: String,
}

/// Decompressed block info table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlocksInfo {
    /// Hash of the uncompressed data, not verified
    pub hash: [u8; 16],
    /// Storage blocks in archive order
    pub blocks: Vec<StorageBlock>,
    /// Directory nodes in archive order
    pub nodes: Vec<Node>,
}

impl BinRead for BlocksInfo {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let hash = <[u8; 16]>::read_options(reader, Endian::Big, ())?;

        let block_count = i32::read_options(reader, Endian::Big, ())?;
        let mut blocks = Vec::new();
        for _ in 0..block_count.max(0) {
            blocks.push(StorageBlock::read_options(reader, Endian::Big, ())?);
        }

        let node_count = i32::read_options(reader, Endian::Big, ())?;
        let mut nodes = Vec::new();
        for _ in 0..node_count.max(0) {
            nodes.push(Node::read_options(reader, Endian::Big, ())?);
        }

        Ok(Self {
            hash,
            blocks,
            nodes,
        })
    }
}

impl BinWrite for BlocksInfo {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.hash.write_options(writer, Endian::Big, ())?;

        (self.blocks.len() as i32).write_options(writer, Endian::Big, ())?;
        for block in &self.blocks {
            block.write_options(writer, Endian::Big, ())?;
        }

        (self.nodes.len() as i32).write_options(writer, Endian::Big, ())?;
        for node in &self.nodes {
            node.write_options(writer, Endian::Big, ())?;
        }

        Ok(())
    }
}

impl BlocksInfo {
    /// Sum of the decompressed block sizes
    pub fn uncompressed_size(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.uncompressed_size as usize)
            .sum()
    }
}
