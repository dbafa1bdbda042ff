#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! End-to-end tests: serialized files packed into bundles, read back, indexed
//! and persisted

use cabmap_crypto::KeyRegistry;
use cabmap_formats::bundle::{BundleBuilder, BundleFile, CompressionType};
use cabmap_formats::class_id::ClassId;
use cabmap_formats::persist::{CabMap, list_maps, map_path};
use cabmap_formats::serialized::{AssetInfo, PPtr, SerializedFile, SerializedFileBuilder};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;

const VECTOR: [u8; 16] = [
    0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88,
];

fn hero_cab() -> Vec<u8> {
    let builder = SerializedFileBuilder::new().add_external("archive:/CAB-shared/CAB-shared");
    let writer = || builder.object_writer();
    let manifest = writer().asset_bundle(
        "hero.bundle",
        &[PPtr::new(0, 2), PPtr::new(1, 9)],
        &[(
            "assets/hero.prefab",
            AssetInfo {
                preload_index: 0,
                preload_size: 2,
                asset: PPtr::new(0, 2),
            },
        )],
    );
    let texture = writer().named("hero_diffuse");
    builder
        .clone()
        .add_object(1, ClassId::AssetBundle, manifest)
        .add_object(2, ClassId::Texture2D, texture)
        .build()
        .unwrap()
}

#[test]
fn encrypted_bundle_yields_serialized_files() {
    let key = KeyRegistry::builtin().select(0).unwrap();
    let archive = BundleBuilder::new()
        .with_compression(CompressionType::Lz4Hc)
        .with_block_size(256)
        .with_encryption(&key, &VECTOR)
        .add_file("archive:/CAB-hero/CAB-hero", hero_cab())
        .add_file("archive:/CAB-hero/CAB-hero.resS", vec![0xEE; 600])
        .build()
        .unwrap();

    let bundle = BundleFile::parse(&archive, Some(&key)).unwrap();
    let entries = bundle.into_entries();
    assert_eq!(entries.len(), 2);

    let serialized: Vec<_> = entries
        .iter()
        .filter(|e| cabmap_formats::serialized::is_serialized_file(&e.data))
        .collect();
    assert_eq!(serialized.len(), 1);

    let file = SerializedFile::parse(serialized[0].file_name(), serialized[0].data.clone()).unwrap();
    assert_eq!(file.identifier, "CAB-hero");
    assert_eq!(file.dependencies(), vec!["CAB-shared"]);

    let manifest = file.object(1).unwrap();
    let bundle_data = file.object_reader(manifest).unwrap().read_asset_bundle().unwrap();
    assert_eq!(bundle_data.name, "hero.bundle");
    assert_eq!(bundle_data.container[0].0, "assets/hero.prefab");

    let texture = file.object(2).unwrap();
    assert_eq!(file.object_reader(texture).unwrap().read_name().unwrap(), "hero_diffuse");
}

#[test]
fn cab_map_persists_bundle_sources() {
    let dir = TempDir::new().unwrap();
    let bundle_path = dir.path().join("hero.bundle");
    let archive = BundleBuilder::new()
        .add_file("archive:/CAB-hero/CAB-hero", hero_cab())
        .build()
        .unwrap();
    std::fs::write(&bundle_path, archive).unwrap();

    let bundle = BundleFile::open(&bundle_path, None).unwrap();
    let mut map = CabMap::new();
    for entry in bundle.entries() {
        map.insert(entry.file_name(), bundle_path.to_string_lossy());
    }

    let maps = dir.path().join("Maps");
    map.save(&map_path(&maps, "game")).unwrap();
    assert_eq!(list_maps(&maps).unwrap(), vec!["game"]);

    let loaded = CabMap::load(&map_path(&maps, "game")).unwrap();
    assert_eq!(loaded.get("cab-hero"), Some(bundle_path.to_string_lossy().as_ref()));
}

proptest! {
    #[test]
    fn cab_map_round_trip(records in prop::collection::vec(("[A-Za-z0-9-]{1,40}", "\\PC{0,80}"), 0..40)) {
        let mut map = CabMap::new();
        for (name, source) in &records {
            map.insert(name.as_str(), source.as_str());
        }

        let mut cursor = std::io::Cursor::new(Vec::new());
        map.write_to(&mut cursor).map_err(|e| TestCaseError::fail(e.to_string()))?;
        cursor.set_position(0);
        let loaded = CabMap::read_from(&mut cursor).map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(loaded.len(), map.len());
        for (name, source) in map.iter() {
            prop_assert_eq!(loaded.get(name), Some(source));
        }
    }
}
