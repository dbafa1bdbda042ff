//! Key registry and persisted key catalog
//!
//! Keys are plain 16-byte AES-128 secrets identified by their position in an
//! ordered list. The registry starts with a small built-in table and can be
//! extended with entries from a JSON catalog on disk.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use aes::Aes128;
use cipher::KeyInit;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CryptoError, Result};

/// Size of a cipher secret in bytes
pub const SECRET_SIZE: usize = 16;

/// Built-in secrets, selectable by index
const BUILTIN_KEYS: &[(&str, &[u8; SECRET_SIZE])] = &[
    ("Global/KR", b"kurokurokurokuro"),
    ("CN/JP/TW", b"y5XPvqLOrCokWRIa"),
];

/// A named cipher secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Display name
    pub name: String,
    /// 16-byte AES-128 secret
    #[serde(with = "secret_hex")]
    pub secret: [u8; SECRET_SIZE],
}

impl KeyEntry {
    /// Create a new key entry
    pub fn new(name: impl Into<String>, secret: [u8; SECRET_SIZE]) -> Self {
        Self {
            name: name.into(),
            secret,
        }
    }

    /// Parse a secret given either as 32 hex characters or as 16 raw ASCII characters
    pub fn from_text(name: impl Into<String>, text: &str) -> Result<Self> {
        Ok(Self::new(name, parse_secret(text)?))
    }
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, hex::encode_upper(self.secret))
    }
}

fn parse_secret(text: &str) -> Result<[u8; SECRET_SIZE]> {
    let text = text.trim();
    let bytes = if text.len() == SECRET_SIZE * 2 && text.chars().all(|c| c.is_ascii_hexdigit()) {
        hex::decode(text).map_err(|e| CryptoError::InvalidKeyFormat(format!("invalid hex: {e}")))?
    } else {
        text.as_bytes().to_vec()
    };

    <[u8; SECRET_SIZE]>::try_from(bytes.as_slice()).map_err(|_| CryptoError::InvalidKeySize {
        expected: SECRET_SIZE,
        actual: bytes.len(),
    })
}

mod secret_hex {
    use super::{SECRET_SIZE, parse_secret};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secret: &[u8; SECRET_SIZE], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode_upper(secret))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; SECRET_SIZE], D::Error> {
        let text = String::deserialize(d)?;
        parse_secret(&text).map_err(serde::de::Error::custom)
    }
}

/// Persisted catalog of named keys
///
/// The catalog is loaded once and replaced wholesale on save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCatalog {
    entries: Vec<KeyEntry>,
}

impl KeyCatalog {
    /// Load a catalog from a JSON file. A missing file yields an empty catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Key catalog {} not found, starting empty", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| CryptoError::CatalogIo {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<KeyEntry> = serde_json::from_str(&text)?;
        info!("Loaded {} keys from {}", entries.len(), path.display());

        Ok(Self { entries })
    }

    /// Replace the catalog on disk with `entries`
    ///
    /// Writes a sibling temporary file and renames it over the target so a
    /// failed write never leaves a half-written catalog behind.
    pub fn save(path: &Path, entries: Vec<KeyEntry>) -> Result<Self> {
        let io_err = |source| CryptoError::CatalogIo {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_string_pretty(&entries)?;
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = Path::new(&tmp_name);

        {
            let mut file = fs::File::create(tmp_path).map_err(io_err)?;
            file.write_all(json.as_bytes()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(tmp_path, path).map_err(io_err)?;

        info!("Saved {} keys to {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    /// Entries in catalog order
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The key chosen for a build run
///
/// Passed explicitly to every component that parses cipher headers.
#[derive(Clone)]
pub struct ActiveKey {
    name: String,
    cipher: Aes128,
}

impl ActiveKey {
    /// Create an active key from an entry
    pub fn new(entry: &KeyEntry) -> Self {
        Self {
            name: entry.name.clone(),
            cipher: Aes128::new(&entry.secret.into()),
        }
    }

    /// Name of the selected entry
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn cipher(&self) -> &Aes128 {
        &self.cipher
    }
}

impl fmt::Debug for ActiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveKey")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered list of selectable keys
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    entries: Vec<KeyEntry>,
}

impl KeyRegistry {
    /// Registry holding only the built-in table
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_KEYS
                .iter()
                .map(|(name, secret)| KeyEntry::new(*name, **secret))
                .collect(),
        }
    }

    /// Registry over arbitrary entries
    pub fn from_entries(entries: Vec<KeyEntry>) -> Self {
        Self { entries }
    }

    /// Built-in table followed by the entries of `catalog`
    pub fn with_catalog(catalog: &KeyCatalog) -> Self {
        let mut registry = Self::builtin();
        registry.entries.extend(catalog.entries().iter().cloned());
        registry
    }

    /// Names of the built-in table, in index order
    pub fn version_names() -> Vec<&'static str> {
        BUILTIN_KEYS.iter().map(|(name, _)| *name).collect()
    }

    /// Select the key at `index`
    pub fn select(&self, index: usize) -> Result<ActiveKey> {
        let entry = self.entries.get(index).ok_or(CryptoError::KeyNotFound {
            index,
            available: self.entries.len(),
        })?;
        info!("Selected key {index}: {}", entry.name);
        Ok(ActiveKey::new(entry))
    }

    /// Entries in index order
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Number of selectable keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no keys are available
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `"<index>: <name>"` lines for presenting the choices back to a user
    pub fn describe(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| format!("{i}: {}", entry.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_table() {
        let registry = KeyRegistry::builtin();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.entries()[0].secret, *b"kurokurokurokuro");
        assert_eq!(KeyRegistry::version_names(), vec!["Global/KR", "CN/JP/TW"]);
    }

    #[test]
    fn test_select_out_of_range() {
        let registry = KeyRegistry::builtin();
        assert!(registry.select(1).is_ok());

        // Index equal to the length is rejected too
        let err = registry.select(2).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::KeyNotFound {
                index: 2,
                available: 2
            }
        ));
    }

    #[test]
    fn test_describe() {
        let registry = KeyRegistry::builtin();
        assert_eq!(registry.describe(), "0: Global/KR\n1: CN/JP/TW");
    }

    #[test]
    fn test_parse_secret_forms() {
        let hex = KeyEntry::from_text("hex", "000102030405060708090A0B0C0D0E0F").unwrap();
        assert_eq!(hex.secret[15], 0x0F);

        let ascii = KeyEntry::from_text("ascii", "0123456789abcdef").unwrap();
        assert_eq!(&ascii.secret, b"0123456789abcdef");

        assert!(matches!(
            KeyEntry::from_text("short", "abc"),
            Err(CryptoError::InvalidKeySize { actual: 3, .. })
        ));
    }

    #[test]
    fn test_catalog_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Keys.json");

        let entries = vec![
            KeyEntry::new("first", [0x11; 16]),
            KeyEntry::new("second", [0x22; 16]),
        ];
        let saved = KeyCatalog::save(&path, entries.clone()).unwrap();
        assert_eq!(saved.entries(), entries.as_slice());

        let loaded = KeyCatalog::load(&path).unwrap();
        assert_eq!(loaded, saved);

        // Saving replaces the whole catalog
        let replaced = KeyCatalog::save(&path, vec![KeyEntry::new("only", [0x33; 16])]).unwrap();
        assert_eq!(KeyCatalog::load(&path).unwrap(), replaced);
        assert_eq!(replaced.len(), 1);
    }

    #[test]
    fn test_catalog_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = KeyCatalog::load(&dir.path().join("absent.json")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_registry_with_catalog_appends() {
        let catalog = KeyCatalog {
            entries: vec![KeyEntry::new("custom", [0x44; 16])],
        };
        let registry = KeyRegistry::with_catalog(&catalog);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.select(2).unwrap().name(), "custom");
    }

    #[test]
    fn test_debug_hides_secret() {
        let entry = KeyEntry::new("hidden", [0xAB; 16]);
        assert!(!format!("{entry:?}").contains("AB"));
    }
}
