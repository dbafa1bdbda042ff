//! Unity serialized files
//!
//! Only the metadata needed to index and name assets is decoded:
//!
//! - **Header**: big-endian sizes, format version and the metadata byte order
//! - **Type table**: class ids; type trees are skipped
//! - **Object table**: path id, data range and class of every object
//! - **Externals**: the files pointers with a non-zero `file_id` refer to
//!
//! Object fields are read on demand through [`ObjectReader`], which knows the
//! handful of layouts the asset map needs (named objects, scene-graph nodes,
//! component owners and bundle manifests).

pub mod builder;
pub mod error;
pub mod file;
pub mod header;
pub mod object;
pub mod stream;

pub use builder::{ObjectWriter, SerializedFileBuilder};
pub use error::{Result, SerializedError};
pub use file::{FileIdentifier, ObjectInfo, PLATFORM_NO_TARGET, SerializedFile, SerializedType};
pub use header::{SerializedHeader, is_serialized_file};
pub use object::{AssetBundleData, AssetInfo, GameObjectData, ObjectReader, PPtr};
pub use stream::{StreamReader, StreamWriter};
