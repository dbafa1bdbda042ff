//! Error types for index and asset map builds

use std::path::PathBuf;

use cabmap_formats::bundle::BundleError;
use cabmap_formats::persist::PersistError;
use cabmap_formats::serialized::SerializedError;
use thiserror::Error;

/// Errors raised while building indices
///
/// Archive and serialized-file errors are per-file: builders log them, count
/// the file as failed and move on.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Archive could not be opened or decoded
    #[error("Failed to read archive {path}: {source}")]
    Archive {
        /// Archive path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: BundleError,
    },

    /// Embedded serialized file could not be parsed
    #[error("Failed to parse {name} in {path}: {source}")]
    Serialized {
        /// Archive path
        path: PathBuf,
        /// Sub-stream name
        name: String,
        /// Underlying error
        #[source]
        source: SerializedError,
    },

    /// Filter pattern is not a valid regular expression
    #[error("Invalid {kind} filter '{pattern}': {source}")]
    InvalidPattern {
        /// Filter the pattern belongs to
        kind: &'static str,
        /// Pattern text
        pattern: String,
        /// Underlying error
        #[source]
        source: regex::Error,
    },

    /// Filter pattern was empty
    #[error("Empty {0} filter pattern")]
    EmptyPattern(&'static str),

    /// Build was stopped through its cancellation token
    #[error("Build cancelled")]
    Cancelled,

    /// Saving or loading an index failed
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Result type for index operations
pub type Result<T> = std::result::Result<T, IndexError>;
