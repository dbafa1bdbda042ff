//! Command-line configuration
//!
//! Options come from CLI arguments, with environment fallbacks for the paths
//! that usually stay fixed between runs:
//!
//! - `CABMAP_KEYS`: key catalog (default `Keys.json`)
//! - `CABMAP_MAPS_DIR`: where CAB maps are saved (default `Maps`)

use std::path::PathBuf;

use cabmap_formats::class_id::ClassId;
use cabmap_formats::persist::ExportListType;
use cabmap_index::{AssetFilter, filter};
use clap::{Parser, ValueEnum};

use crate::error::ConfigError;

/// Which indices to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MapOp {
    /// Build nothing; list the assets that pass the filters
    #[default]
    None,
    /// Build the CAB map
    CabMap,
    /// Build the asset map
    AssetMap,
    /// Build both
    Both,
}

impl MapOp {
    /// Check if the CAB map is requested
    pub fn builds_cab_map(self) -> bool {
        matches!(self, Self::CabMap | Self::Both)
    }

    /// Check if the asset map is requested
    pub fn builds_asset_map(self) -> bool {
        matches!(self, Self::AssetMap | Self::Both)
    }
}

/// Configuration for one `cabmap` run
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cabmap",
    about = "Build CAB maps and asset maps over obfuscated Unity bundles",
    version
)]
pub struct CliConfig {
    /// Input file or folder
    pub input: PathBuf,

    /// Output folder
    pub output: PathBuf,

    /// Index of the decryption key (built-in keys first, then the catalog)
    #[arg(long)]
    pub key_index: usize,

    /// Unity class type(s) to keep, e.g. Texture2D Sprite
    #[arg(long, num_args = 1..)]
    pub types: Vec<ClassId>,

    /// Name regex filter(s), case-insensitive
    #[arg(long, num_args = 1.., value_parser = parse_name_pattern)]
    pub names: Vec<String>,

    /// Container regex filter(s), case-insensitive
    #[arg(long, num_args = 1.., value_parser = parse_container_pattern)]
    pub containers: Vec<String>,

    /// Which map(s) to build
    #[arg(long, value_enum, default_value_t = MapOp::None)]
    pub map_op: MapOp,

    /// CAB map file name
    #[arg(long, default_value = "CABMap")]
    pub cab_name: String,

    /// Asset map file name
    #[arg(long, default_value = "assets_map")]
    pub map_name: String,

    /// Asset map document format
    #[arg(long, default_value_t = ExportListType::Xml)]
    pub export_type: ExportListType,

    /// Key catalog file
    #[arg(long, env = "CABMAP_KEYS", default_value = "Keys.json")]
    pub keys: PathBuf,

    /// Folder CAB maps are saved in
    #[arg(long, env = "CABMAP_MAPS_DIR", default_value = "Maps")]
    pub maps_dir: PathBuf,

    /// Only log warnings and errors
    #[arg(long)]
    pub silent: bool,
}

impl CliConfig {
    /// Parse configuration from command-line arguments
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Check the configuration before any file is touched
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.exists() {
            return Err(ConfigError::MissingInput(self.input.clone()));
        }
        if self.map_op.builds_asset_map() && !self.input.is_dir() {
            return Err(ConfigError::AssetMapRequiresDirectory(self.input.clone()));
        }
        check_file_name("cab-name", &self.cab_name)?;
        check_file_name("map-name", &self.map_name)?;
        Ok(())
    }

    /// Acceptance rules built from the filter options
    pub fn filter(&self) -> cabmap_index::Result<AssetFilter> {
        AssetFilter::new()
            .with_types(self.types.iter().copied())
            .with_names(self.names.as_slice())?
            .with_containers(self.containers.as_slice())
    }

    /// Default log level
    pub fn log_level(&self) -> &'static str {
        if self.silent { "warn" } else { "info" }
    }
}

fn check_file_name(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
        return Err(ConfigError::InvalidFileName {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn parse_pattern(kind: &'static str, value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err("empty string".to_string());
    }
    filter::compile(kind, &[value]).map_err(|e| e.to_string())?;
    Ok(value.to_string())
}

fn parse_name_pattern(value: &str) -> Result<String, String> {
    parse_pattern("name", value)
}

fn parse_container_pattern(value: &str) -> Result<String, String> {
    parse_pattern("container", value)
}
