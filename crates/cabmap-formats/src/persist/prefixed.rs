//! Strings with a 7-bit variable-length size prefix
//!
//! Each prefix byte carries seven bits of the UTF-8 byte length, least
//! significant group first, with the high bit set on every byte but the last.

use std::fmt;

use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite, Endian};

/// Longest prefix that still fits a 32-bit length
const MAX_PREFIX_BYTES: usize = 5;

/// A UTF-8 string preceded by its 7-bit encoded byte length
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixedString(pub String);

impl From<&str> for PrefixedString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<PrefixedString> for String {
    fn from(s: PrefixedString) -> Self {
        s.0
    }
}

impl fmt::Display for PrefixedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl BinRead for PrefixedString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;

        let mut len: u64 = 0;
        let mut terminated = false;
        for i in 0..MAX_PREFIX_BYTES {
            let byte = u8::read_options(reader, Endian::Little, ())?;
            len |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                terminated = true;
                break;
            }
        }
        if !terminated || len > u64::from(i32::MAX as u32) {
            return Err(binrw::Error::AssertFail {
                pos,
                message: "string length prefix is malformed".to_string(),
            });
        }

        let mut bytes = Vec::new();
        reader.take(len).read_to_end(&mut bytes)?;
        if bytes.len() as u64 != len {
            return Err(binrw::Error::AssertFail {
                pos,
                message: format!("string of {len} bytes is truncated at {}", bytes.len()),
            });
        }

        String::from_utf8(bytes)
            .map(Self)
            .map_err(|e| binrw::Error::AssertFail {
                pos,
                message: format!("string is not valid UTF-8: {e}"),
            })
    }
}

impl BinWrite for PrefixedString {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let mut len = self.0.len();
        loop {
            let low = (len & 0x7F) as u8;
            len >>= 7;
            if len == 0 {
                writer.write_all(&[low])?;
                break;
            }
            writer.write_all(&[low | 0x80])?;
        }
        writer.write_all(self.0.as_bytes())?;
        Ok(())
    }
}
