//! Unity container formats and index persistence
//!
//! This crate reads the two Unity container layers the CAB index works on and
//! stores the indices built from them:
//!
//! - [`bundle`]: `UnityFS` archives, including the obfuscated variant decoded
//!   with [`cabmap_crypto`]
//! - [`serialized`]: serialized files (`CAB-<hash>`) found inside bundles
//! - [`persist`]: the binary CAB map and exported asset lists
//! - [`class_id`]: Unity class ids and the exportable-type allowlist
//!
//! # Example
//!
//! ```rust
//! use cabmap_formats::bundle::{BundleBuilder, BundleFile};
//! use cabmap_formats::class_id::ClassId;
//! use cabmap_formats::serialized::{SerializedFile, SerializedFileBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = SerializedFileBuilder::new();
//! let texture = builder.object_writer().named("hero_diffuse");
//! let cab = builder.add_object(1, ClassId::Texture2D, texture).build()?;
//!
//! let archive = BundleBuilder::new()
//!     .add_file("archive:/CAB-hero/CAB-hero", cab)
//!     .build()?;
//!
//! let bundle = BundleFile::parse(&archive, None)?;
//! let entry = &bundle.entries()[0];
//! let file = SerializedFile::parse(entry.file_name(), entry.data.clone())?;
//! assert_eq!(file.identifier, "CAB-hero");
//! assert_eq!(file.objects[0].class_id, ClassId::Texture2D);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod bundle;
pub mod class_id;
pub mod persist;
pub mod serialized;

pub use bundle::{BundleEntry, BundleError, BundleFile};
pub use class_id::ClassId;
pub use persist::{AssetEntry, CabMap, ExportListType, PersistError};
pub use serialized::{ObjectReader, PPtr, SerializedError, SerializedFile};
