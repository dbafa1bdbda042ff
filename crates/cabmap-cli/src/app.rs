//! One `cabmap` run: select the key, scan the input, build the requested maps

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cabmap_crypto::{KeyCatalog, KeyRegistry};
use cabmap_formats::persist::{export_asset_list, map_path};
use cabmap_index::{AssetMapBuilder, BundleArchiveSource, CabMapBuilder};
use tracing::{error, info};
use walkdir::WalkDir;

use crate::config::{CliConfig, MapOp};

/// Collect the files under `input`
///
/// A file is returned as is. Folders are walked recursively and the result is
/// ordered by path length, then by path, so shallow archives come first.
pub fn scan_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input) {
        let entry = entry.with_context(|| format!("Failed to scan {}", input.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort_by(|a, b| {
        let (a, b) = (a.to_string_lossy(), b.to_string_lossy());
        a.len().cmp(&b.len()).then_with(|| a.cmp(&b))
    });
    Ok(files)
}

/// Execute the run described by `config`
pub fn run(config: &CliConfig) -> Result<()> {
    config.validate()?;
    let filter = config.filter()?;

    let catalog = KeyCatalog::load(&config.keys)
        .with_context(|| format!("Failed to load key catalog {}", config.keys.display()))?;
    let registry = KeyRegistry::with_catalog(&catalog);
    let key = match registry.select(config.key_index) {
        Ok(key) => key,
        Err(e) => {
            error!("Invalid key index, available keys:\n{}", registry.describe());
            return Err(e.into());
        }
    };

    info!("Scanning for files");
    let files = scan_files(&config.input)?;
    info!("Found {} file(s)", files.len());

    let source = BundleArchiveSource::with_key(key);

    if config.map_op.builds_cab_map() {
        let index = CabMapBuilder::new(&source).build(&files).into_result()?;
        let path = map_path(&config.maps_dir, &config.cab_name);
        index.map.save(&path)?;
        info!(
            "CABMap saved to {} ({}, {} dependencies)",
            path.display(),
            index.summary,
            index.dependencies.len()
        );
    }

    if config.map_op.builds_asset_map() {
        let map = AssetMapBuilder::new(&source)
            .with_filter(filter)
            .build(&files)
            .into_result()?;
        let path = export_asset_list(
            &map.entries,
            &config.map_name,
            &config.output,
            config.export_type,
        )?;
        info!("AssetMap saved to {} ({})", path.display(), map.summary);
    } else if config.map_op == MapOp::None {
        let map = AssetMapBuilder::new(&source)
            .with_filter(filter)
            .build(&files)
            .into_result()?;
        for entry in &map.entries {
            info!(
                "{} [{}] {} in {}",
                entry.name,
                entry.class_id,
                entry.container,
                entry.source
            );
        }
        info!("Listed assets without writing: {}", map.summary);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"not a bundle").unwrap();
    }

    #[test]
    fn test_scan_orders_by_path_length() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("deeper/nested/c.bundle"));
        touch(&dir.path().join("bb.bundle"));
        touch(&dir.path().join("a.bundle"));
        touch(&dir.path().join("sub/z.bundle"));

        let files: Vec<_> = scan_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a.bundle"),
                PathBuf::from("bb.bundle"),
                PathBuf::from("sub/z.bundle"),
                PathBuf::from("deeper/nested/c.bundle"),
            ]
        );
    }

    #[test]
    fn test_scan_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("only.bundle");
        touch(&file);
        assert_eq!(scan_files(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_run_rejects_bad_key_index() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(&input).unwrap();
        let keys = dir.path().join("Keys.json");

        let config = CliConfig::try_parse_from([
            "cabmap",
            input.to_str().unwrap(),
            dir.path().join("out").to_str().unwrap(),
            "--key-index",
            "99",
            "--keys",
            keys.to_str().unwrap(),
        ])
        .unwrap();
        assert!(run(&config).is_err());
    }

    #[test]
    fn test_run_builds_empty_maps_over_unreadable_files() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        touch(&input.join("junk.bundle"));
        let output = dir.path().join("out");
        let maps = dir.path().join("Maps");

        let config = CliConfig::try_parse_from([
            "cabmap",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "--key-index",
            "0",
            "--map-op",
            "both",
            "--keys",
            dir.path().join("Keys.json").to_str().unwrap(),
            "--maps-dir",
            maps.to_str().unwrap(),
        ])
        .unwrap();
        run(&config).unwrap();

        assert!(maps.join("CABMap.bin").is_file());
        let xml = fs::read_to_string(output.join("assets_map.xml")).unwrap();
        assert!(xml.contains("<Assets"));
        assert!(!xml.contains("<Asset>"));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        touch(&input.join("junk.bundle"));
        let output = dir.path().join("out");
        let maps = dir.path().join("Maps");

        let config = CliConfig::try_parse_from([
            "cabmap",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "--key-index",
            "0",
            "--keys",
            dir.path().join("Keys.json").to_str().unwrap(),
            "--maps-dir",
            maps.to_str().unwrap(),
        ])
        .unwrap();
        run(&config).unwrap();

        assert!(!maps.exists());
        assert!(!output.exists());
    }
}
