//! CAB index: which bundle file holds each serialized file
//!
//! Binary layout (little-endian):
//!
//! ```text
//! i32                 record count
//! repeat count times:
//!   PrefixedString    CAB name
//!   PrefixedString    bundle path
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinWrite, BinWriterExt};
use tracing::debug;

use super::error::{PersistError, Result};
use super::prefixed::PrefixedString;

/// File extension of persisted maps
pub const MAP_EXTENSION: &str = "bin";

/// Serialized file name, compared without regard to ASCII case
#[derive(Debug, Clone)]
pub struct CabName(String);

impl CabName {
    /// Wrap a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name as originally spelled
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl PartialEq for CabName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for CabName {}

impl Hash for CabName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.folded() {
            state.write_u8(b);
        }
        state.write_u8(0xFF);
    }
}

impl PartialOrd for CabName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CabName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl fmt::Display for CabName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CabName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(BinRead, BinWrite)]
#[brw(little)]
struct CabRecord {
    name: PrefixedString,
    source: PrefixedString,
}

/// Mapping from serialized file name to the bundle path containing it
///
/// The first insertion of a name wins.
///
/// # Example
///
/// ```rust
/// use cabmap_formats::persist::CabMap;
///
/// let mut map = CabMap::new();
/// assert!(map.insert("CAB-abc", "bundles/a.bundle"));
/// assert!(!map.insert("cab-ABC", "bundles/b.bundle"));
/// assert_eq!(map.get("CAB-ABC"), Some("bundles/a.bundle"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CabMap {
    entries: BTreeMap<CabName, String>,
}

impl CabMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping unless the name is already present
    ///
    /// Returns `false` on a collision, leaving the existing entry untouched.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) -> bool {
        let name = CabName::new(name);
        if self.entries.contains_key(&name) {
            return false;
        }
        self.entries.insert(name, source.into());
        true
    }

    /// Bundle path holding `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&CabName::from(name)).map(String::as_str)
    }

    /// Check if `name` is mapped
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&CabName::from(name))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize to a writer
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let count = i32::try_from(self.entries.len()).map_err(|_| PersistError::InvalidCount(-1))?;
        writer.write_le(&count)?;
        for (name, source) in &self.entries {
            CabRecord {
                name: PrefixedString::from(name.as_str()),
                source: PrefixedString::from(source.as_str()),
            }
            .write(writer)?;
        }
        Ok(())
    }

    /// Deserialize from a reader
    ///
    /// Duplicate names keep the first record.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let count = i32::read_le(reader)?;
        if count < 0 {
            return Err(PersistError::InvalidCount(count));
        }

        let mut map = Self::new();
        for _ in 0..count {
            let record = CabRecord::read(reader)?;
            if !map.insert(record.name.0, record.source.0) {
                debug!("Skipping duplicate CAB record");
            }
        }
        Ok(map)
    }

    /// Write the map to `path`, creating parent directories and replacing
    /// any existing file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(PersistError::io(parent))?;
        }
        let file = File::create(path).map_err(PersistError::io(path))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush().map_err(PersistError::io(path))?;
        debug!("Saved {} CAB entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a map from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(PersistError::io(path))?;
        let map = Self::read_from(&mut BufReader::new(file))?;
        debug!("Loaded {} CAB entries from {}", map.len(), path.display());
        Ok(map)
    }
}

/// Location of the map called `name` under `dir`
pub fn map_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{MAP_EXTENSION}"))
}

/// Names of the maps saved directly under `dir`, sorted
///
/// The directory is created if it does not exist yet.
pub fn list_maps(dir: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(dir).map_err(PersistError::io(dir))?;

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(PersistError::io(dir))? {
        let path = entry.map_err(PersistError::io(dir))?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().is_some_and(|ext| ext == MAP_EXTENSION) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
