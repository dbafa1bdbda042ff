//! Command-line front end for building CAB maps and asset maps
//!
//! The `cabmap` binary is a thin wrapper over [`app::run`]; everything it
//! does is available here for embedding and tests.

#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod error;

pub use app::{run, scan_files};
pub use config::{CliConfig, MapOp};
pub use error::ConfigError;
