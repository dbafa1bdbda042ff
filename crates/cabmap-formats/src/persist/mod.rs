//! On-disk indices
//!
//! - [`CabMap`]: serialized file name to bundle path, saved as `<dir>/<name>.bin`
//! - [`AssetEntry`] lists: exported as XML or JSON documents

pub mod asset_list;
pub mod cab_map;
pub mod error;
pub mod prefixed;

pub use asset_list::{AssetEntry, ExportListType, export_asset_list, write_json, write_xml};
pub use cab_map::{CabMap, CabName, MAP_EXTENSION, list_maps, map_path};
pub use error::{PersistError, Result};
pub use prefixed::PrefixedString;
