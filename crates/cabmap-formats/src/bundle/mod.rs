//! `UnityFS` bundle archives
//!
//! A bundle is a big-endian container holding one or more named files, usually
//! serialized files (`CAB-<hash>`) and their resource streams. The layout is:
//!
//! - **Header**: signature, format version, engine revision, sizes and flags
//! - **Cipher header** (encrypted archives only): see [`cabmap_crypto::engine`]
//! - **Block info**: storage block table and directory nodes, optionally
//!   LZ4-compressed and optionally stored at the end of the archive
//! - **Storage blocks**: compressed chunks that concatenate to the file data
//!
//! Encrypted blocks carry flag `0x100` and are passed through
//! [`cabmap_crypto::CipherState::decrypt_block`] with their block index before
//! LZ4 decompression.

pub mod blocks;
pub mod builder;
pub mod error;
pub mod header;
pub mod reader;

pub use blocks::{BlocksInfo, Node, StorageBlock};
pub use builder::BundleBuilder;
pub use error::{BundleError, Result};
pub use header::{BundleHeader, CompressionType, SIGNATURE};
pub use reader::{BundleEntry, BundleFile};
