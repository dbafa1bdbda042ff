//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the command line that are detected before any work starts
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Input path does not exist
    #[error("Input path not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Asset maps are built over a folder of archives
    #[error("Unable to build an asset map with a single file as input: {}", .0.display())]
    AssetMapRequiresDirectory(PathBuf),

    /// Output names end up as file names
    #[error("Invalid {field} '{value}': must be a non-empty file name")]
    InvalidFileName {
        /// Option the value came from
        field: &'static str,
        /// Offending value
        value: String,
    },
}
