//! Key management and block cipher for obfuscated Unity bundle containers
//!
//! Some games wrap their `UnityFS` bundles in an extra obfuscation layer: a
//! small encrypted header follows the archive header, and the control bytes of
//! every LZ4 block are rewritten with a keyed nibble substitution. This crate
//! recovers the substitution tables and undoes the rewrite.
//!
//! # Components
//!
//! - **Key Registry**: built-in secrets plus a JSON catalog of named keys
//! - **Cipher Engine**: header parsing, table derivation and in-place block decoding
//!
//! # Example
//!
//! ```no_run
//! use cabmap_crypto::{CipherState, KeyRegistry};
//!
//! # fn example(header: &[u8], block: &mut [u8]) -> Result<(), cabmap_crypto::CryptoError> {
//! let key = KeyRegistry::builtin().select(0)?;
//! let state = CipherState::derive(header, &key)?;
//! let size = block.len();
//! state.decrypt_block(block, size, 0)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod keys;

pub use engine::{CipherState, HEADER_SIZE, SIGNATURE};
pub use error::{CryptoError, Result};
pub use keys::{ActiveKey, KeyCatalog, KeyEntry, KeyRegistry};
