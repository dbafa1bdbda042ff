//! Serialized files loaded for one build step, and pointer resolution
//! between them

use std::collections::HashMap;
use std::path::Path;

use cabmap_formats::bundle::BundleEntry;
use cabmap_formats::serialized::{ObjectInfo, PPtr, SerializedFile, is_serialized_file};
use tracing::trace;

use crate::error::{IndexError, Result};

/// Arena address of a loaded object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Position of the file in the [`LoadedSet`]
    pub file_index: usize,
    /// Path id inside that file
    pub path_id: i64,
}

impl ObjectKey {
    /// Create a key
    pub fn new(file_index: usize, path_id: i64) -> Self {
        Self {
            file_index,
            path_id,
        }
    }
}

#[derive(Debug)]
struct LoadedFile {
    file: SerializedFile,
    by_path_id: HashMap<i64, usize>,
}

/// Serialized files of one archive, addressable by [`ObjectKey`]
///
/// Pointers are resolved by lookup only: a pointer into a file that is not
/// loaded, or to an object that does not exist, resolves to nothing.
#[derive(Debug, Default)]
pub struct LoadedSet {
    files: Vec<LoadedFile>,
}

impl LoadedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every serialized file among an archive's sub-streams
    ///
    /// Other sub-streams (resource blobs and the like) are skipped. A
    /// serialized file that fails to parse fails the whole archive.
    pub fn from_sub_streams(archive: &Path, entries: Vec<BundleEntry>) -> Result<Self> {
        let mut set = Self::new();
        for entry in entries {
            if !is_serialized_file(&entry.data) {
                trace!("Skipping non-serialized stream {}", entry.path);
                continue;
            }
            let name = entry.file_name().to_string();
            let file = SerializedFile::parse(name.clone(), entry.data).map_err(|source| {
                IndexError::Serialized {
                    path: archive.to_path_buf(),
                    name,
                    source,
                }
            })?;
            set.push(file);
        }
        Ok(set)
    }

    /// Add a parsed file, returning its index
    pub fn push(&mut self, file: SerializedFile) -> usize {
        let by_path_id = file
            .objects
            .iter()
            .enumerate()
            .map(|(i, info)| (info.path_id, i))
            .collect();
        self.files.push(LoadedFile { file, by_path_id });
        self.files.len() - 1
    }

    /// Number of loaded files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Loaded files in load order
    pub fn files(&self) -> impl Iterator<Item = &SerializedFile> {
        self.files.iter().map(|f| &f.file)
    }

    /// File at `index`
    pub fn file(&self, index: usize) -> Option<&SerializedFile> {
        self.files.get(index).map(|f| &f.file)
    }

    /// Index of the file named `name`, ignoring ASCII case
    pub fn find_file(&self, name: &str) -> Option<usize> {
        self.files
            .iter()
            .position(|f| f.file.identifier.eq_ignore_ascii_case(name))
    }

    /// Resolve `pointer` as read from an object in file `from`
    pub fn resolve(&self, from: usize, pointer: PPtr) -> Option<ObjectKey> {
        let file_index = match pointer.file_id {
            0 => from,
            id if id > 0 => {
                let external = self.file(from)?.externals.get(id as usize - 1)?;
                self.find_file(external.file_name())?
            }
            _ => return None,
        };
        let key = ObjectKey::new(file_index, pointer.path_id);
        self.object(key).map(|_| key)
    }

    /// Object table entry for `key`
    pub fn object(&self, key: ObjectKey) -> Option<&ObjectInfo> {
        let loaded = self.files.get(key.file_index)?;
        let slot = *loaded.by_path_id.get(&key.path_id)?;
        loaded.file.objects.get(slot)
    }
}
