//! Index builders for Unity bundle collections
//!
//! Two builders consume archives through an [`ArchiveSource`]:
//!
//! - [`CabMapBuilder`] maps every serialized file name (`CAB-<hash>`) to the
//!   archive holding it, first archive wins
//! - [`AssetMapBuilder`] lists named, filtered assets with their container
//!   paths, resolving Animator names and container slices in deferred passes
//!
//! Both visit archives in the caller's order, skip archives that fail to read
//! and poll a [`CancellationToken`] between archives. Results carry a
//! [`BuildSummary`].
//!
//! # Example
//!
//! ```no_run
//! use cabmap_crypto::KeyRegistry;
//! use cabmap_formats::persist::map_path;
//! use cabmap_index::{BundleArchiveSource, CabMapBuilder};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = KeyRegistry::builtin().select(0)?;
//! let files = vec![PathBuf::from("data/a.bundle"), PathBuf::from("data/b.bundle")];
//!
//! let index = CabMapBuilder::new(BundleArchiveSource::with_key(key))
//!     .build(&files)
//!     .into_result()?;
//! index.map.save(&map_path(Path::new("Maps"), "CABMap"))?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod asset_map;
pub mod cab_index;
pub mod cancel;
pub mod error;
pub mod filter;
pub mod model;
pub mod session;
pub mod source;
pub mod summary;

pub use asset_map::{AssetMap, AssetMapBuilder};
pub use cab_index::{CabIndex, CabMapBuilder};
pub use cancel::CancellationToken;
pub use error::{IndexError, Result};
pub use filter::AssetFilter;
pub use model::{BuiltinObjectModel, ObjectModel};
pub use session::{LoadedSet, ObjectKey};
pub use source::{ArchiveSource, BundleArchiveSource, MemoryArchiveSource};
pub use summary::{BuildOutcome, BuildSummary};
