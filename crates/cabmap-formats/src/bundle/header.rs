//! `UnityFS` archive header

use binrw::{BinRead, BinWrite, NullString};

/// Archive signature including its terminator
pub const SIGNATURE: &[u8; 8] = b"UnityFS\0";

/// Archive flag bits
pub mod flags {
    /// Compression scheme of the block info table
    pub const COMPRESSION_MASK: u32 = 0x3F;
    /// Block info and directory share one table
    pub const BLOCKS_AND_DIRECTORY_COMBINED: u32 = 0x40;
    /// Block info is stored at the end of the archive
    pub const BLOCKS_INFO_AT_END: u32 = 0x80;
    /// Block info is followed by padding to a 16-byte boundary
    pub const BLOCK_INFO_NEEDS_PADDING: u32 = 0x200;
    /// Encryption bit on current engines
    pub const ENCRYPTION: u32 = 0x400;
    /// Encryption bit on older engines, which reuse the padding bit
    pub const LEGACY_ENCRYPTION: u32 = 0x200;
    /// Block-level flag marking an encrypted block
    pub const BLOCK_ENCRYPTED: u16 = 0x100;
}

/// Compression scheme of a block or of the block info table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// Stored
    None,
    /// LZMA
    Lzma,
    /// LZ4
    Lz4,
    /// LZ4 high compression, same block format as LZ4
    Lz4Hc,
    /// Anything else
    Other(u32),
}

impl CompressionType {
    /// Decode the low six bits of a flag word
    pub fn from_flags(flags: u32) -> Self {
        match flags & flags::COMPRESSION_MASK {
            0 => Self::None,
            1 => Self::Lzma,
            2 => Self::Lz4,
            3 => Self::Lz4Hc,
            other => Self::Other(other),
        }
    }

    /// Numeric scheme id
    pub fn as_u32(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Lzma => 1,
            Self::Lz4 => 2,
            Self::Lz4Hc => 3,
            Self::Other(other) => other,
        }
    }
}

/// Archive header (big-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big, magic = b"UnityFS\0")]
pub struct BundleHeader {
    /// Archive format version
    pub version: u32,

    /// Player version string, usually `5.x.x`
    #[br(map = |s: NullString| s.to_string())]
    #[bw(map = |s: &String| NullString::from(s.as_str()))]
    pub unity_version: String,

    /// Engine revision, e.g. `2019.4.40f1`
    #[br(map = |s: NullString| s.to_string())]
    #[bw(map = |s: &String| NullString::from(s.as_str()))]
    pub unity_revision: String,

    /// Total archive size
    pub size: i64,

    /// Stored size of the block info table
    pub compressed_blocks_info_size: u32,

    /// Size of the block info table once decompressed
    pub uncompressed_blocks_info_size: u32,

    /// Archive flags, see [`flags`]
    pub flags: u32,
}

impl BundleHeader {
    /// Engine revision as `[major, minor, patch]`
    pub fn engine_version(&self) -> [u32; 3] {
        parse_engine_version(&self.unity_revision)
    }

    /// Check whether this engine still signals encryption with the padding bit
    pub fn uses_legacy_encryption_flag(&self) -> bool {
        match self.engine_version() {
            [major, _, _] if major < 2020 => true,
            [2020, 3, patch] => patch <= 34,
            [2021, 3, patch] => patch <= 2,
            [2022, 3, patch] => patch <= 1,
            _ => false,
        }
    }

    /// Check if the cipher header follows this header
    pub fn is_encrypted(&self) -> bool {
        let mask = if self.uses_legacy_encryption_flag() {
            flags::LEGACY_ENCRYPTION
        } else {
            flags::ENCRYPTION
        };
        self.flags & mask != 0
    }

    /// Check if the block info table is padded to 16 bytes
    pub fn block_info_needs_padding(&self) -> bool {
        !self.uses_legacy_encryption_flag() && self.flags & flags::BLOCK_INFO_NEEDS_PADDING != 0
    }

    /// Check if the block info table is stored at the end of the archive
    pub fn blocks_info_at_end(&self) -> bool {
        self.flags & flags::BLOCKS_INFO_AT_END != 0
    }

    /// Compression of the block info table
    pub fn compression(&self) -> CompressionType {
        CompressionType::from_flags(self.flags)
    }
}

/// Extract the first three numeric groups of a version string
///
/// Missing groups are zero, so `"2019.4.40f1"` gives `[2019, 4, 40]` and
/// `"5.x.x"` gives `[5, 0, 0]`.
pub fn parse_engine_version(text: &str) -> [u32; 3] {
    let mut out = [0u32; 3];
    let groups = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|group| !group.is_empty())
        .take(3);
    for (slot, group) in out.iter_mut().zip(groups) {
        *slot = group.parse().unwrap_or(0);
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::BinReaderExt;
    use binrw::io::Cursor;
    use pretty_assertions::assert_eq;

    fn header(revision: &str, flag_bits: u32) -> BundleHeader {
        BundleHeader {
            version: 7,
            unity_version: "5.x.x".to_string(),
            unity_revision: revision.to_string(),
            size: 0,
            compressed_blocks_info_size: 0,
            uncompressed_blocks_info_size: 0,
            flags: flag_bits,
        }
    }

    #[test]
    fn test_header_round_trip() {
        let original = header("2019.4.40f1", 0x43);
        let mut cursor = Cursor::new(Vec::new());
        original.write(&mut cursor).unwrap();

        let bytes = cursor.into_inner();
        assert!(bytes.starts_with(SIGNATURE));

        let parsed: BundleHeader = Cursor::new(bytes).read_be().unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.compression(), CompressionType::Lz4Hc);
    }

    #[test]
    fn test_bad_magic() {
        let result: binrw::BinResult<BundleHeader> = Cursor::new(b"UnityWeb\0".to_vec()).read_be();
        assert!(result.is_err());
    }

    #[test]
    fn test_engine_version() {
        assert_eq!(parse_engine_version("2019.4.40f1"), [2019, 4, 40]);
        assert_eq!(parse_engine_version("5.x.x"), [5, 0, 0]);
        assert_eq!(parse_engine_version(""), [0, 0, 0]);
    }

    #[test]
    fn test_encryption_flag_by_engine() {
        // Older engines reuse the padding bit
        let old = header("2019.4.40f1", flags::LEGACY_ENCRYPTION);
        assert!(old.is_encrypted());
        assert!(!old.block_info_needs_padding());

        let patched = header("2020.3.34f1", flags::LEGACY_ENCRYPTION);
        assert!(patched.is_encrypted());

        let newer = header("2020.3.35f1", flags::BLOCK_INFO_NEEDS_PADDING);
        assert!(!newer.is_encrypted());
        assert!(newer.block_info_needs_padding());

        let current = header("2022.3.10f1", flags::ENCRYPTION);
        assert!(current.is_encrypted());
    }
}
