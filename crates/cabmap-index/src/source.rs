//! Archive readers the builders draw sub-streams from

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cabmap_crypto::ActiveKey;
use cabmap_formats::bundle::{BundleEntry, BundleFile};

use crate::error::{IndexError, Result};

/// Source of named sub-streams, one call per container file
pub trait ArchiveSource {
    /// Decode the archive at `path` into its sub-streams, in directory order
    fn sub_streams(&self, path: &Path) -> Result<Vec<BundleEntry>>;
}

impl<T: ArchiveSource + ?Sized> ArchiveSource for &T {
    fn sub_streams(&self, path: &Path) -> Result<Vec<BundleEntry>> {
        (**self).sub_streams(path)
    }
}

/// Reads `UnityFS` bundles from disk, decrypting them with the selected key
#[derive(Debug, Clone, Default)]
pub struct BundleArchiveSource {
    key: Option<ActiveKey>,
}

impl BundleArchiveSource {
    /// Source for bundles that are never encrypted
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that decodes encrypted bundles with `key`
    pub fn with_key(key: ActiveKey) -> Self {
        Self { key: Some(key) }
    }

    /// Key used for encrypted bundles
    pub fn key(&self) -> Option<&ActiveKey> {
        self.key.as_ref()
    }
}

impl ArchiveSource for BundleArchiveSource {
    fn sub_streams(&self, path: &Path) -> Result<Vec<BundleEntry>> {
        BundleFile::open(path, self.key.as_ref())
            .map(BundleFile::into_entries)
            .map_err(|source| IndexError::Archive {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Archives already decoded into memory, keyed by path
///
/// Paths without an entry fail like an unreadable file would.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchiveSource {
    archives: HashMap<PathBuf, Vec<BundleEntry>>,
}

impl MemoryArchiveSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the sub-streams of `path`, replacing earlier ones
    pub fn insert(&mut self, path: impl Into<PathBuf>, entries: Vec<BundleEntry>) {
        self.archives.insert(path.into(), entries);
    }

    /// Builder-style [`Self::insert`]
    #[must_use]
    pub fn with_archive(mut self, path: impl Into<PathBuf>, entries: Vec<BundleEntry>) -> Self {
        self.insert(path, entries);
        self
    }
}

impl ArchiveSource for MemoryArchiveSource {
    fn sub_streams(&self, path: &Path) -> Result<Vec<BundleEntry>> {
        self.archives
            .get(path)
            .cloned()
            .ok_or_else(|| IndexError::Archive {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound).into(),
            })
    }
}
