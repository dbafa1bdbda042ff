//! Error types for serialized file parsing

use thiserror::Error;

/// Errors that can occur when parsing serialized files or reading objects
#[derive(Debug, Error)]
pub enum SerializedError {
    /// Header does not describe a serialized file of this length
    #[error("Not a serialized file: {0}")]
    NotSerializedFile(String),

    /// Format version outside the supported range
    #[error("Unsupported serialized file version: {0}")]
    UnsupportedVersion(u32),

    /// Object refers to a type slot that does not exist
    #[error("Object {path_id} refers to missing type index {type_index}")]
    InvalidTypeIndex {
        /// Object path id
        path_id: i64,
        /// Type table index
        type_index: i32,
    },

    /// Object byte range lies outside the file
    #[error("Object {path_id} data at {start}+{size} lies outside the file")]
    ObjectOutOfRange {
        /// Object path id
        path_id: i64,
        /// Absolute start offset
        start: u64,
        /// Declared size
        size: u32,
    },

    /// A count field was negative
    #[error("Invalid {what} count: {count}")]
    InvalidCount {
        /// Which table
        what: &'static str,
        /// Raw value
        count: i32,
    },

    /// `BinRW` parsing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for serialized file operations
pub type Result<T> = std::result::Result<T, SerializedError>;
