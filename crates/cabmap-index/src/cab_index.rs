//! Container index: which archive holds each serialized file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cabmap_formats::persist::{CabMap, CabName};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::session::LoadedSet;
use crate::source::ArchiveSource;
use crate::summary::{BuildOutcome, BuildSummary};

/// A finished container index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CabIndex {
    /// Serialized file name to archive path
    pub map: CabMap,
    /// External dependency names declared by each indexed file
    pub dependencies: BTreeMap<CabName, Vec<String>>,
    /// Build counters
    pub summary: BuildSummary,
}

/// Builds a [`CabIndex`] over an ordered list of archives
///
/// Archives are visited in the order given. When two archives contain a
/// serialized file of the same name, the earlier archive keeps it and the
/// later one counts as a collision.
///
/// # Example
///
/// ```rust
/// use cabmap_formats::bundle::BundleEntry;
/// use cabmap_formats::serialized::SerializedFileBuilder;
/// use cabmap_index::{CabMapBuilder, MemoryArchiveSource};
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let shared = BundleEntry {
///     path: "archive:/shared.cab/shared.cab".to_string(),
///     data: SerializedFileBuilder::new().build()?,
/// };
/// let source = MemoryArchiveSource::new()
///     .with_archive("a.bundle", vec![shared.clone()])
///     .with_archive("b.bundle", vec![shared]);
///
/// let files = [PathBuf::from("a.bundle"), PathBuf::from("b.bundle")];
/// let index = CabMapBuilder::new(source).build(&files).into_result()?;
/// assert_eq!(index.map.get("shared.cab"), Some("a.bundle"));
/// assert_eq!(index.summary.collisions, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CabMapBuilder<S> {
    source: S,
    cancel: CancellationToken,
}

impl<S: ArchiveSource> CabMapBuilder<S> {
    /// Create a builder reading archives through `source`
    pub fn new(source: S) -> Self {
        Self {
            source,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between files once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Index `files` in order
    ///
    /// Unreadable archives are logged and skipped. On cancellation the
    /// partial index is discarded.
    pub fn build(&self, files: &[PathBuf]) -> BuildOutcome<CabIndex> {
        let mut index = CabIndex {
            summary: BuildSummary {
                files_total: files.len(),
                ..BuildSummary::default()
            },
            ..CabIndex::default()
        };

        for (i, path) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("CABMap build cancelled after {i} of {} files", files.len());
                index.summary.exported = index.map.len();
                return BuildOutcome::Cancelled(index.summary);
            }

            match self.scan(path) {
                Ok(found) => {
                    let source = path.to_string_lossy();
                    for (name, dependencies) in found {
                        if index.map.insert(name.clone(), source.as_ref()) {
                            index.dependencies.insert(CabName::new(name), dependencies);
                        } else {
                            debug!("{name} in {} already indexed, skipping", path.display());
                            index.summary.collisions += 1;
                        }
                    }
                    index.summary.files_processed += 1;
                    info!("[{}/{}] Processed {}", i + 1, files.len(), display_name(path));
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    index.summary.files_failed += 1;
                }
            }
        }

        index.summary.exported = index.map.len();
        info!(
            "CABMap build finished: {} entries, {} collisions",
            index.map.len(),
            index.summary.collisions
        );
        BuildOutcome::Completed(index)
    }

    /// Serialized file names and their dependencies, in directory order
    fn scan(&self, path: &Path) -> Result<Vec<(String, Vec<String>)>> {
        let entries = self.source.sub_streams(path)?;
        let set = LoadedSet::from_sub_streams(path, entries)?;
        Ok(set
            .files()
            .map(|file| {
                let dependencies = file.dependencies().into_iter().map(str::to_string).collect();
                (file.identifier.clone(), dependencies)
            })
            .collect())
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
