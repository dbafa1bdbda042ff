//! Bitstream cipher for obfuscated bundle blocks
//!
//! Encrypted containers embed a 70-byte header right after the archive header:
//!
//! ```text
//! u32        is-encrypted marker (non-zero)
//! [u8; 16]   vector 1     [u8; 16] key 1     u8 padding
//! [u8; 16]   vector 2     [u8; 16] key 2     u8 padding
//! ```
//!
//! Each vector is recovered by AES-128-ECB encrypting its key block under the
//! active secret and XOR-ing the result into the vector. Vector 2 must read
//! `#$unity3dchina!@`. Vector 1 is expanded into nibbles that seed the two
//! 16-entry substitution tables used by the block decoder.
//!
//! The decoder walks an LZ4-style token stream and only rewrites the control
//! bytes (token, length extensions and the two-byte match field). Literal runs
//! are skipped untouched.

use aes::Block;
use cipher::BlockEncrypt;

use crate::error::{CryptoError, Result};
use crate::keys::ActiveKey;

/// Plaintext expected in the second recovered vector
pub const SIGNATURE: &[u8; 16] = b"#$unity3dchina!@";

/// Size of one vector/key pair including its padding byte
const VECTOR_PAIR_SIZE: usize = 16 + 16 + 1;

/// Total size of the cipher header
pub const HEADER_SIZE: usize = 4 + 2 * VECTOR_PAIR_SIZE;

/// Substitution tables derived from one container's cipher header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherState {
    index: [u8; 16],
    sub: [u8; 16],
}

impl CipherState {
    /// Parse a cipher header and derive the decode tables
    ///
    /// `header` must hold at least [`HEADER_SIZE`] bytes; exactly that many are
    /// consumed.
    pub fn derive(header: &[u8], key: &ActiveKey) -> Result<Self> {
        if header.len() < HEADER_SIZE {
            return Err(CryptoError::TruncatedHeader {
                needed: HEADER_SIZE,
                actual: header.len(),
            });
        }

        let marker = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        if marker == 0 {
            return Err(CryptoError::NotEncrypted);
        }

        let (mut data1, key1) = read_vector(&header[4..4 + VECTOR_PAIR_SIZE]);
        let (mut data2, key2) = read_vector(&header[4 + VECTOR_PAIR_SIZE..HEADER_SIZE]);

        decrypt_vector(key, &key2, &mut data2);
        if &data2 != SIGNATURE {
            return Err(CryptoError::InvalidSignature {
                expected: "#$unity3dchina!@",
                actual: data2,
            });
        }

        decrypt_vector(key, &key1, &mut data1);
        Ok(Self::from_vector(&data1))
    }

    /// Build the tables from a recovered 16-byte vector
    pub fn from_vector(vector: &[u8; 16]) -> Self {
        let nibbles = to_nibbles(vector);

        let mut index = [0u8; 16];
        index.copy_from_slice(&nibbles[..16]);

        let mut sub = [0u8; 16];
        for i in 0..4 {
            let j = 16 + 4 * i;
            sub[i] = nibbles[j];
            sub[i + 4] = nibbles[j + 1];
            sub[i + 8] = nibbles[j + 2];
            sub[i + 12] = nibbles[j + 3];
        }

        Self { index, sub }
    }

    /// Build a cipher header whose first vector recovers to `vector` under `key`
    ///
    /// The key blocks are fixed, which is enough to produce encrypted fixtures.
    pub fn encode_header(key: &ActiveKey, vector: &[u8; 16]) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&1u32.to_be_bytes());
        encode_pair(key, vector, &[0x5A; 16], &mut header[4..4 + VECTOR_PAIR_SIZE]);
        encode_pair(key, SIGNATURE, &[0xC3; 16], &mut header[4 + VECTOR_PAIR_SIZE..]);
        header
    }

    /// Index table
    pub fn index_table(&self) -> &[u8; 16] {
        &self.index
    }

    /// Sub table
    pub fn sub_table(&self) -> &[u8; 16] {
        &self.sub
    }

    /// Decode the first `size` bytes of `buf` in place
    ///
    /// The n-th token of the block is keyed with `token_index + n`. Returns the
    /// number of bytes consumed, which always equals `size` on success.
    pub fn decrypt_block(&self, buf: &mut [u8], size: usize, token_index: u32) -> Result<usize> {
        let mut index = token_index;
        self.decrypt_tokens(buf, size, &mut index)
    }

    /// Decode the first `size` bytes of `buf`, threading the token counter
    ///
    /// `token_index` is advanced once per decoded token so consecutive calls on
    /// one logical stream continue where the previous call stopped.
    pub fn decrypt_tokens(&self, buf: &mut [u8], size: usize, token_index: &mut u32) -> Result<usize> {
        self.run_tokens(buf, size, token_index, Direction::Decrypt)
    }

    /// Encode the first `size` bytes of `buf` in place, the inverse of
    /// [`Self::decrypt_block`]
    ///
    /// Requires the index table to be a permutation of the sixteen nibble values.
    pub fn encrypt_block(&self, buf: &mut [u8], size: usize, token_index: u32) -> Result<usize> {
        let mut inverse = [0u8; 16];
        let mut seen = 0u16;
        for (nibble, &value) in self.index.iter().enumerate() {
            seen |= 1 << value;
            inverse[usize::from(value)] = nibble as u8;
        }
        if seen != u16::MAX {
            return Err(CryptoError::NotInvertible);
        }

        let mut index = token_index;
        self.run_tokens(buf, size, &mut index, Direction::Encrypt(inverse))
    }

    fn run_tokens(
        &self,
        buf: &mut [u8],
        size: usize,
        token_index: &mut u32,
        direction: Direction,
    ) -> Result<usize> {
        if size > buf.len() {
            return Err(CryptoError::CorruptStream {
                offset: buf.len(),
                size,
            });
        }

        let mut offset = 0;
        while offset < size {
            offset += self.transform_token(&mut buf[offset..size], *token_index, direction)?;
            *token_index = token_index.wrapping_add(1);
        }

        Ok(offset)
    }

    /// Transform one token at the start of `bytes`, returning the bytes it spans
    fn transform_token(&self, bytes: &mut [u8], mut index: u32, direction: Direction) -> Result<usize> {
        let remaining = bytes.len();
        let mut offset = 0;

        let cur = self.transform_byte(bytes, &mut offset, &mut index, direction)?;
        let mut high = usize::from(cur >> 4);
        let low = cur & 0xF;

        if high == 0xF {
            loop {
                let b = self.transform_byte(bytes, &mut offset, &mut index, direction)?;
                high += usize::from(b);
                if b != 0xFF {
                    break;
                }
            }
        }

        // Literal run, left as is
        offset += high;

        if offset < remaining {
            self.transform_byte(bytes, &mut offset, &mut index, direction)?;
            self.transform_byte(bytes, &mut offset, &mut index, direction)?;
            if low == 0xF {
                while self.transform_byte(bytes, &mut offset, &mut index, direction)? == 0xFF {}
            }
        }

        if offset > remaining {
            return Err(CryptoError::CorruptStream {
                offset,
                size: remaining,
            });
        }

        Ok(offset)
    }

    /// Rewrite the byte at `offset`, advancing the cursor and the token index
    ///
    /// Returns the plaintext value of the byte in either direction.
    fn transform_byte(
        &self,
        bytes: &mut [u8],
        offset: &mut usize,
        index: &mut u32,
        direction: Direction,
    ) -> Result<u8> {
        let size = bytes.len();
        let Some(byte) = bytes.get_mut(*offset) else {
            return Err(CryptoError::CorruptStream {
                offset: *offset,
                size,
            });
        };

        let i = *index as usize;
        let b = self.sub[((i >> 2) & 3) + 4]
            + self.sub[i & 3]
            + self.sub[((i >> 4) & 3) + 8]
            + self.sub[((i & 0xFF) >> 6) + 12];

        let plain = match direction {
            Direction::Decrypt => {
                let low = self.index[usize::from(*byte & 0xF)].wrapping_sub(b) & 0xF;
                let high = self.index[usize::from(*byte >> 4)].wrapping_sub(b) << 4;
                *byte = low | high;
                *byte
            }
            Direction::Encrypt(inverse) => {
                let plain = *byte;
                let low = inverse[usize::from((plain & 0xF).wrapping_add(b) & 0xF)];
                let high = inverse[usize::from((plain >> 4).wrapping_add(b) & 0xF)];
                *byte = low | (high << 4);
                plain
            }
        };

        *offset += 1;
        *index = index.wrapping_add(1);
        Ok(plain)
    }
}

/// Which way a block is being transformed
#[derive(Debug, Clone, Copy)]
enum Direction {
    Decrypt,
    /// Carries the inverse of the index table
    Encrypt([u8; 16]),
}

fn read_vector(pair: &[u8]) -> ([u8; 16], [u8; 16]) {
    let mut data = [0u8; 16];
    let mut key = [0u8; 16];
    data.copy_from_slice(&pair[..16]);
    key.copy_from_slice(&pair[16..32]);
    // pair[32] is padding
    (data, key)
}

fn decrypt_vector(key: &ActiveKey, key_block: &[u8; 16], data: &mut [u8; 16]) {
    let mut block = Block::clone_from_slice(key_block);
    key.cipher().encrypt_block(&mut block);
    for (d, k) in data.iter_mut().zip(block.iter()) {
        *d ^= k;
    }
}

fn encode_pair(key: &ActiveKey, plain: &[u8; 16], key_block: &[u8; 16], out: &mut [u8]) {
    let mut data = *plain;
    decrypt_vector(key, key_block, &mut data);
    out[..16].copy_from_slice(&data);
    out[16..32].copy_from_slice(key_block);
    out[32] = 0;
}

/// Split each byte into its high and low nibble, in that order
fn to_nibbles(source: &[u8; 16]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, byte) in source.iter().enumerate() {
        out[i * 2] = byte >> 4;
        out[i * 2 + 1] = byte & 0xF;
    }
    out
}
