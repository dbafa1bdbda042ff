//! Asset map: a flattened, filtered list of named assets
//!
//! Every archive is resolved on its own. Its serialized files are loaded into
//! a [`LoadedSet`] and walked in three passes:
//!
//! 1. **Objects**: each allowlisted object is named by its type's rule and
//!    either accepted, registered for later lookups, or both. Bundle
//!    manifests contribute container slices and Animators contribute
//!    pending owner pointers.
//! 2. **Animators**: each pending Animator takes the name of the
//!    GameObject it points to, or is dropped if that fails or the name is
//!    filtered out.
//! 3. **Containers**: each slice stamps its container path on the entries it
//!    covers, or removes them if the container is filtered out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cabmap_formats::class_id::ClassId;
use cabmap_formats::persist::AssetEntry;
use cabmap_formats::serialized::{ObjectInfo, PPtr, SerializedFile};
use tracing::{debug, info, warn};

use crate::cab_index::display_name;
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::filter::AssetFilter;
use crate::model::{BuiltinObjectModel, ObjectModel};
use crate::session::{LoadedSet, ObjectKey};
use crate::source::ArchiveSource;
use crate::summary::{BuildOutcome, BuildSummary};

/// A finished asset map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMap {
    /// Surviving entries in discovery order
    pub entries: Vec<AssetEntry>,
    /// Build counters
    pub summary: BuildSummary,
}

/// A run of a manifest's preload table claimed by one container path
#[derive(Debug, Clone, PartialEq, Eq)]
struct PreloadSlice {
    file_index: usize,
    pointer: PPtr,
    container: String,
}

/// An accepted Animator waiting for its owner's name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingAnimator {
    slot: usize,
    file_index: usize,
    owner: PPtr,
}

/// Pass-1 output for one archive
#[derive(Debug, Default)]
struct Collected {
    slots: Vec<Option<AssetEntry>>,
    by_key: HashMap<ObjectKey, usize>,
    game_objects: HashMap<ObjectKey, String>,
    slices: Vec<PreloadSlice>,
    animators: Vec<PendingAnimator>,
}

/// How pass 1 treats one object
#[derive(Debug, Default)]
struct Classified {
    name: String,
    exportable: bool,
    registered: bool,
    owner: Option<PPtr>,
    slices: Vec<(PPtr, String)>,
}

/// Builds an [`AssetMap`] over an ordered list of archives
///
/// # Example
///
/// ```rust
/// use cabmap_formats::bundle::BundleEntry;
/// use cabmap_formats::class_id::ClassId;
/// use cabmap_formats::serialized::SerializedFileBuilder;
/// use cabmap_index::{AssetFilter, AssetMapBuilder, MemoryArchiveSource};
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let builder = SerializedFileBuilder::new();
/// let texture = builder.object_writer().named("hero_diffuse");
/// let cab = BundleEntry {
///     path: "archive:/CAB-hero/CAB-hero".to_string(),
///     data: builder.add_object(5, ClassId::Texture2D, texture).build()?,
/// };
/// let source = MemoryArchiveSource::new().with_archive("hero.bundle", vec![cab]);
///
/// let map = AssetMapBuilder::new(source)
///     .with_filter(AssetFilter::new().with_names(&["^hero"])?)
///     .build(&[PathBuf::from("hero.bundle")])
///     .into_result()?;
/// assert_eq!(map.entries[0].name, "hero_diffuse");
/// assert_eq!(map.entries[0].path_id, 5);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AssetMapBuilder<S, M = BuiltinObjectModel> {
    source: S,
    model: M,
    filter: AssetFilter,
    cancel: CancellationToken,
}

impl<S: ArchiveSource> AssetMapBuilder<S> {
    /// Create a builder reading archives through `source`
    pub fn new(source: S) -> Self {
        Self {
            source,
            model: BuiltinObjectModel,
            filter: AssetFilter::new(),
            cancel: CancellationToken::new(),
        }
    }
}

impl<S: ArchiveSource, M: ObjectModel> AssetMapBuilder<S, M> {
    /// Use `model` for typed parsing the resolver cannot do itself
    pub fn with_model<N: ObjectModel>(self, model: N) -> AssetMapBuilder<S, N> {
        AssetMapBuilder {
            source: self.source,
            model,
            filter: self.filter,
            cancel: self.cancel,
        }
    }

    /// Replace the acceptance rules
    #[must_use]
    pub fn with_filter(mut self, filter: AssetFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Stop between files once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Resolve `files` in order
    ///
    /// Unreadable archives are logged and skipped. On cancellation the
    /// partial list is discarded.
    pub fn build(&self, files: &[PathBuf]) -> BuildOutcome<AssetMap> {
        let mut map = AssetMap {
            summary: BuildSummary {
                files_total: files.len(),
                ..BuildSummary::default()
            },
            ..AssetMap::default()
        };

        for (i, path) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("AssetMap build cancelled after {i} of {} files", files.len());
                map.summary.exported = map.entries.len();
                return BuildOutcome::Cancelled(map.summary);
            }

            match self.resolve_archive(path) {
                Ok(entries) => {
                    map.entries.extend(entries);
                    map.summary.files_processed += 1;
                    info!("[{}/{}] Processed {}", i + 1, files.len(), display_name(path));
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    map.summary.files_failed += 1;
                }
            }
        }

        map.summary.exported = map.entries.len();
        info!("AssetMap build finished: {} entries", map.entries.len());
        BuildOutcome::Completed(map)
    }

    fn resolve_archive(&self, path: &Path) -> Result<Vec<AssetEntry>> {
        let entries = self.source.sub_streams(path)?;
        let set = LoadedSet::from_sub_streams(path, entries)?;
        let source = path.to_string_lossy();

        let mut collected = Collected::default();
        for (file_index, file) in set.files().enumerate() {
            for info in &file.objects {
                if !info.class_id.is_exportable() {
                    continue;
                }
                self.collect_object(&mut collected, file_index, file, info, &source);
            }
        }

        self.resolve_animators(&set, &mut collected);
        self.assign_containers(&set, &mut collected);

        Ok(collected.slots.into_iter().flatten().collect())
    }

    /// Pass 1 for a single object
    fn collect_object(
        &self,
        collected: &mut Collected,
        file_index: usize,
        file: &SerializedFile,
        info: &ObjectInfo,
        source: &str,
    ) {
        let key = ObjectKey::new(file_index, info.path_id);
        let classified = match self.classify(file, info) {
            Ok(classified) => classified,
            Err(e) => {
                debug!(
                    "Skipping {} object {} in {}: {e}",
                    info.class_id, info.path_id, file.identifier
                );
                return;
            }
        };

        collected
            .slices
            .extend(classified.slices.into_iter().map(|(pointer, container)| PreloadSlice {
                file_index,
                pointer,
                container,
            }));
        if info.class_id == ClassId::GameObject {
            collected.game_objects.insert(key, classified.name.clone());
        }

        // Animators are named in pass 2, so only exportability applies here
        let is_animator = info.class_id == ClassId::Animator;
        let accepted = classified.exportable
            && (is_animator || self.filter.accepts_type(info.class_id))
            && (is_animator || self.filter.accepts_name(&classified.name));
        if !accepted {
            return;
        }

        let slot = collected.slots.len();
        collected.slots.push(Some(AssetEntry {
            name: classified.name,
            container: String::new(),
            class_id: info.class_id,
            path_id: info.path_id,
            source: source.to_string(),
        }));
        if classified.registered {
            collected.by_key.insert(key, slot);
        }
        if let Some(owner) = classified.owner {
            collected.animators.push(PendingAnimator {
                slot,
                file_index,
                owner,
            });
        }
    }

    /// Name an object and decide whether it can be exported
    fn classify(
        &self,
        file: &SerializedFile,
        info: &ObjectInfo,
    ) -> cabmap_formats::serialized::Result<Classified> {
        let mut reader = file.object_reader(info)?;
        let classified = match info.class_id {
            ClassId::AssetBundle => {
                let bundle = reader.read_asset_bundle()?;
                let mut slices = Vec::new();
                for (container, asset) in &bundle.container {
                    let start = asset.preload_index.max(0) as usize;
                    let count = asset.preload_size.max(0) as usize;
                    for pointer in bundle.preload_table.iter().skip(start).take(count) {
                        slices.push((*pointer, container.clone()));
                    }
                }
                Classified {
                    name: bundle.name,
                    slices,
                    ..Classified::default()
                }
            }
            ClassId::GameObject => Classified {
                name: reader.read_game_object()?.name,
                registered: true,
                ..Classified::default()
            },
            ClassId::Shader => {
                let mut name = reader.read_name()?;
                if name.is_empty() {
                    name = self.model.parsed_shader_name(&mut reader).unwrap_or_default();
                }
                Classified {
                    name,
                    exportable: true,
                    registered: true,
                    ..Classified::default()
                }
            }
            ClassId::Animator => Classified {
                owner: Some(reader.read_component_owner()?),
                exportable: true,
                registered: true,
                ..Classified::default()
            },
            _ => Classified {
                name: reader.read_name()?,
                exportable: true,
                registered: true,
                ..Classified::default()
            },
        };
        Ok(classified)
    }

    /// Pass 2: borrow GameObject names for pending Animators
    fn resolve_animators(&self, set: &LoadedSet, collected: &mut Collected) {
        for pending in std::mem::take(&mut collected.animators) {
            let name = set
                .resolve(pending.file_index, pending.owner)
                .and_then(|key| collected.game_objects.get(&key))
                .filter(|name| self.filter.accepts_name(name))
                .filter(|_| self.filter.accepts_type(ClassId::Animator))
                .cloned();

            let Some(slot) = collected.slots.get_mut(pending.slot) else {
                continue;
            };
            match name {
                Some(name) => {
                    if let Some(entry) = slot {
                        entry.name = name;
                    }
                }
                None => *slot = None,
            }
        }
    }

    /// Pass 3: stamp or enforce container paths
    fn assign_containers(&self, set: &LoadedSet, collected: &mut Collected) {
        for slice in std::mem::take(&mut collected.slices) {
            let Some(key) = set.resolve(slice.file_index, slice.pointer) else {
                continue;
            };
            let Some(&slot) = collected.by_key.get(&key) else {
                continue;
            };
            let Some(cell) = collected.slots.get_mut(slot) else {
                continue;
            };
            if self.filter.accepts_container(&slice.container) {
                if let Some(entry) = cell {
                    entry.container = slice.container;
                }
            } else {
                *cell = None;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::MemoryArchiveSource;
    use cabmap_formats::bundle::BundleEntry;
    use cabmap_formats::serialized::{AssetInfo, ObjectReader, SerializedFileBuilder};
    use pretty_assertions::assert_eq;

    fn entry(name: &str, builder: SerializedFileBuilder) -> BundleEntry {
        BundleEntry {
            path: format!("archive:/{name}/{name}"),
            data: builder.build().unwrap(),
        }
    }

    /// Manifest, texture, rig with an Animator, loose material and an
    /// Animator pointing nowhere
    fn hero_archive() -> Vec<BundleEntry> {
        let b = SerializedFileBuilder::new();
        let w = || b.object_writer();
        let manifest = w().asset_bundle(
            "hero.bundle",
            &[PPtr::new(0, 2), PPtr::new(0, 3), PPtr::new(0, 4)],
            &[
                (
                    "assets/hero/diffuse.png",
                    AssetInfo {
                        preload_index: 0,
                        preload_size: 1,
                        asset: PPtr::new(0, 2),
                    },
                ),
                (
                    "assets/hero/rig.prefab",
                    AssetInfo {
                        preload_index: 1,
                        preload_size: 2,
                        asset: PPtr::new(0, 3),
                    },
                ),
            ],
        );
        let texture = w().named("hero_diffuse");
        let rig = w().game_object("HeroRig", &[PPtr::new(0, 4)]);
        let animator = w().component(PPtr::new(0, 3));
        let material = w().named("hero_mat");
        let orphan = w().component(PPtr::new(0, 99));
        let transform = w().named("ignored");

        vec![entry(
            "CAB-hero",
            b.add_object(1, ClassId::AssetBundle, manifest)
                .add_object(2, ClassId::Texture2D, texture)
                .add_object(3, ClassId::GameObject, rig)
                .add_object(4, ClassId::Animator, animator)
                .add_object(5, ClassId::Material, material)
                .add_object(6, ClassId::Animator, orphan)
                .add_object(7, ClassId::Transform, transform),
        )]
    }

    fn run(filter: AssetFilter) -> Vec<(String, ClassId, i64, String)> {
        let source = MemoryArchiveSource::new().with_archive("hero.bundle", hero_archive());
        AssetMapBuilder::new(source)
            .with_filter(filter)
            .build(&[PathBuf::from("hero.bundle")])
            .into_result()
            .unwrap()
            .entries
            .into_iter()
            .map(|e| (e.name, e.class_id, e.path_id, e.container))
            .collect()
    }

    fn row(name: &str, class_id: ClassId, path_id: i64, container: &str) -> (String, ClassId, i64, String) {
        (name.to_string(), class_id, path_id, container.to_string())
    }

    #[test]
    fn test_unfiltered_map() {
        assert_eq!(
            run(AssetFilter::new()),
            vec![
                row("hero_diffuse", ClassId::Texture2D, 2, "assets/hero/diffuse.png"),
                row("HeroRig", ClassId::Animator, 4, "assets/hero/rig.prefab"),
                row("hero_mat", ClassId::Material, 5, ""),
            ]
        );
    }

    #[test]
    fn test_entry_source_is_archive_path() {
        let source = MemoryArchiveSource::new().with_archive("data/hero.bundle", hero_archive());
        let map = AssetMapBuilder::new(source)
            .build(&[PathBuf::from("data/hero.bundle")])
            .into_result()
            .unwrap();
        assert!(map.entries.iter().all(|e| e.source == "data/hero.bundle"));
        assert_eq!(map.summary.exported, 3);
        assert_eq!(map.summary.files_processed, 1);
    }

    #[test]
    fn test_animator_takes_name_that_passes_filter() {
        let filter = AssetFilter::new().with_names(&["^hero"]).unwrap();
        let rows = run(filter);
        assert!(rows.contains(&row("HeroRig", ClassId::Animator, 4, "assets/hero/rig.prefab")));
        assert!(rows.iter().all(|r| !r.0.is_empty()));
    }

    #[test]
    fn test_animator_dropped_when_owner_name_filtered() {
        let filter = AssetFilter::new().with_names(&["diffuse"]).unwrap();
        assert_eq!(
            run(filter),
            vec![row("hero_diffuse", ClassId::Texture2D, 2, "assets/hero/diffuse.png")]
        );
    }

    #[test]
    fn test_type_filter_applies_to_animators_in_second_pass() {
        let textures = AssetFilter::new().with_types([ClassId::Texture2D]);
        assert_eq!(
            run(textures),
            vec![row("hero_diffuse", ClassId::Texture2D, 2, "assets/hero/diffuse.png")]
        );

        let animators = AssetFilter::new().with_types([ClassId::Animator]);
        assert_eq!(
            run(animators),
            vec![row("HeroRig", ClassId::Animator, 4, "assets/hero/rig.prefab")]
        );
    }

    #[test]
    fn test_container_filter_removes_mismatches() {
        let filter = AssetFilter::new().with_containers(&[r"\.prefab$"]).unwrap();
        assert_eq!(
            run(filter),
            vec![
                row("HeroRig", ClassId::Animator, 4, "assets/hero/rig.prefab"),
                row("hero_mat", ClassId::Material, 5, ""),
            ]
        );
    }

    struct ParsedFormModel;

    impl ObjectModel for ParsedFormModel {
        fn parsed_shader_name(&self, reader: &mut ObjectReader<'_>) -> Option<String> {
            reader.read_aligned_string().ok()
        }
    }

    fn shader_archive() -> Vec<BundleEntry> {
        let b = SerializedFileBuilder::new();
        let named = b.object_writer().named("Custom/Toon");
        let unnamed = b
            .object_writer()
            .aligned_string("")
            .aligned_string("Hidden/Parsed")
            .finish();
        vec![entry(
            "CAB-shaders",
            b.add_object(1, ClassId::Shader, named)
                .add_object(2, ClassId::Shader, unnamed),
        )]
    }

    #[test]
    fn test_shader_name_falls_back_to_model() {
        let source = MemoryArchiveSource::new().with_archive("s.bundle", shader_archive());
        let files = [PathBuf::from("s.bundle")];

        let names = |map: AssetMap| map.entries.into_iter().map(|e| e.name).collect::<Vec<_>>();

        let builtin = AssetMapBuilder::new(&source).build(&files).into_result().unwrap();
        assert_eq!(names(builtin), vec!["Custom/Toon", ""]);

        let parsed = AssetMapBuilder::new(&source)
            .with_model(ParsedFormModel)
            .build(&files)
            .into_result()
            .unwrap();
        assert_eq!(names(parsed), vec!["Custom/Toon", "Hidden/Parsed"]);
    }

    #[test]
    fn test_pointers_resolve_across_files_of_one_archive_only() {
        let a = SerializedFileBuilder::new().add_external("archive:/CAB-rig/CAB-rig");
        let animator = a.object_writer().component(PPtr::new(1, 10));
        let a = a.add_object(1, ClassId::Animator, animator);

        let rig = SerializedFileBuilder::new();
        let go = rig.object_writer().game_object("SharedRig", &[]);
        let rig = rig.add_object(10, ClassId::GameObject, go);

        let together = vec![entry("CAB-anim", a.clone()), entry("CAB-rig", rig.clone())];
        let source = MemoryArchiveSource::new()
            .with_archive("together.bundle", together)
            .with_archive("anim.bundle", vec![entry("CAB-anim", a)])
            .with_archive("rig.bundle", vec![entry("CAB-rig", rig)]);

        let map = AssetMapBuilder::new(source)
            .build(&[
                PathBuf::from("together.bundle"),
                PathBuf::from("rig.bundle"),
                PathBuf::from("anim.bundle"),
            ])
            .into_result()
            .unwrap();
        let names: Vec<_> = map.entries.iter().map(|e| (e.name.as_str(), e.source.as_str())).collect();
        assert_eq!(names, vec![("SharedRig", "together.bundle")]);
    }

    #[test]
    fn test_archive_order_is_preserved() {
        let make = |name: &str| {
            let b = SerializedFileBuilder::new();
            let t = b.object_writer().named(name);
            vec![entry(&format!("CAB-{name}"), b.add_object(1, ClassId::TextAsset, t))]
        };
        let source = MemoryArchiveSource::new()
            .with_archive("x.bundle", make("x"))
            .with_archive("y.bundle", make("y"));
        let map = AssetMapBuilder::new(source)
            .build(&[PathBuf::from("y.bundle"), PathBuf::from("missing"), PathBuf::from("x.bundle")])
            .into_result()
            .unwrap();
        let names: Vec<_> = map.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["y", "x"]);
        assert_eq!(map.summary.files_failed, 1);
    }

    struct CancelOnRead {
        inner: MemoryArchiveSource,
        token: CancellationToken,
    }

    impl ArchiveSource for CancelOnRead {
        fn sub_streams(&self, path: &Path) -> Result<Vec<BundleEntry>> {
            self.token.cancel();
            self.inner.sub_streams(path)
        }
    }

    #[test]
    fn test_cancel_between_files_stops_after_current() {
        let token = CancellationToken::new();
        let source = CancelOnRead {
            inner: MemoryArchiveSource::new()
                .with_archive("hero.bundle", hero_archive())
                .with_archive("again.bundle", hero_archive()),
            token: token.clone(),
        };
        let outcome = AssetMapBuilder::new(source)
            .with_cancellation(token)
            .build(&[PathBuf::from("hero.bundle"), PathBuf::from("again.bundle")]);

        assert!(outcome.is_cancelled());
        if let BuildOutcome::Cancelled(summary) = outcome {
            assert_eq!(summary.files_total, 2);
            assert_eq!(summary.files_processed, 1);
            assert_eq!(summary.files_failed, 0);
            assert!(summary.exported > 0);
        }
    }

    #[test]
    fn test_cancelled_build_discards_entries() {
        let token = CancellationToken::new();
        let source = MemoryArchiveSource::new().with_archive("hero.bundle", hero_archive());
        let builder = AssetMapBuilder::new(source).with_cancellation(token.clone());
        token.cancel();
        assert!(builder.build(&[PathBuf::from("hero.bundle")]).is_cancelled());
    }
}
