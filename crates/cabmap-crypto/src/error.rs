//! Error types for key handling and container decryption

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while selecting keys or decoding obfuscated data
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key size
    #[error("Invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize {
        /// Expected key size in bytes
        expected: usize,
        /// Actual key size in bytes
        actual: usize,
    },

    /// Invalid key format
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Catalog index out of range
    #[error("Key index {index} is out of range ({available} keys available)")]
    KeyNotFound {
        /// Requested index
        index: usize,
        /// Number of entries that could have been selected
        available: usize,
    },

    /// The container's "is encrypted" marker was zero
    #[error("Container is not encrypted")]
    NotEncrypted,

    /// Recovered signature did not match; wrong key or corrupt header
    #[error("Invalid signature: expected {expected:?}, got {actual:02X?}")]
    InvalidSignature {
        /// Expected plaintext signature
        expected: &'static str,
        /// Recovered bytes
        actual: [u8; 16],
    },

    /// Cipher header was shorter than required
    #[error("Truncated cipher header: need {needed} bytes, got {actual}")]
    TruncatedHeader {
        /// Bytes required
        needed: usize,
        /// Bytes available
        actual: usize,
    },

    /// Token consumption overran the block
    #[error("Corrupt stream: token at offset {offset} overruns block of {size} bytes")]
    CorruptStream {
        /// Offset of the token that overran
        offset: usize,
        /// Declared block size
        size: usize,
    },

    /// Index table is not a permutation, so blocks cannot be encoded
    #[error("Cipher tables are not invertible")]
    NotInvertible,

    /// Failed to read or write the key catalog
    #[error("Key catalog I/O error at {path}: {source}")]
    CatalogIo {
        /// Catalog path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Key catalog was not valid JSON
    #[error("Invalid key catalog: {0}")]
    CatalogJson(#[from] serde_json::Error),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
