//! Error types for bundle archive parsing

use cabmap_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur when reading or building bundle archives
#[derive(Debug, Error)]
pub enum BundleError {
    /// Not a `UnityFS` archive
    #[error("Invalid bundle signature: {0:02X?}")]
    InvalidSignature(Vec<u8>),

    /// Archive format version outside the supported range
    #[error("Unsupported bundle version: {0}")]
    UnsupportedVersion(u32),

    /// Compression scheme this reader does not decode
    #[error("Unsupported compression type: {0}")]
    UnsupportedCompression(u32),

    /// Archive is encrypted but no key was supplied
    #[error("Bundle is encrypted but no key is active")]
    MissingKey,

    /// LZ4 decompression failed
    #[error("Failed to decompress block {index}: {source}")]
    Decompression {
        /// Block index, or `u32::MAX` for the block info table
        index: u32,
        /// Underlying decoder error
        #[source]
        source: lz4_flex::block::DecompressError,
    },

    /// A block decompressed to an unexpected size
    #[error("Block {index} size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Block index
        index: u32,
        /// Declared uncompressed size
        expected: usize,
        /// Produced size
        actual: usize,
    },

    /// A block declares more output than its stored bytes can produce
    #[error("Block {index} declares {uncompressed} bytes from {compressed} stored bytes")]
    BlockTooLarge {
        /// Block index
        index: u32,
        /// Stored size
        compressed: usize,
        /// Declared uncompressed size
        uncompressed: usize,
    },

    /// The archive ends before the declared data
    #[error("Truncated bundle: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        /// Read offset
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// A directory node points outside the decompressed data
    #[error("Node {path} lies outside the bundle data")]
    NodeOutOfRange {
        /// Node path
        path: String,
    },

    /// Cipher header or block decoding failed
    #[error("Decryption failed: {0}")]
    Crypto(#[from] CryptoError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRW` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for bundle operations
pub type Result<T> = std::result::Result<T, BundleError>;
