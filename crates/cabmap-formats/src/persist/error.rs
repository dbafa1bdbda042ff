//! Error types for map persistence and asset list export

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while saving or loading maps
#[derive(Debug, Error)]
pub enum PersistError {
    /// File system operation failed
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Record count was negative
    #[error("Invalid record count: {0}")]
    InvalidCount(i32),

    /// `BinRW` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistError>;
