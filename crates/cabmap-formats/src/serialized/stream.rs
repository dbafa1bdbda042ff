//! Endian-aware primitive reader and writer
//!
//! Serialized files switch endianness after the header, so the byte order is a
//! runtime value here rather than a `#[brw]` attribute.

use binrw::io::{Cursor, Seek, SeekFrom};
use binrw::{BinReaderExt, Endian, NullString};

use super::error::{Result, SerializedError};

/// Primitive reader over a byte slice
#[derive(Debug, Clone)]
pub struct StreamReader<'a> {
    cursor: Cursor<&'a [u8]>,
    endian: Endian,
}

impl<'a> StreamReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self {
            cursor: Cursor::new(data),
            endian,
        }
    }

    /// Current byte order
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Switch byte order for subsequent reads
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Current offset
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Move to an absolute offset
    pub fn set_position(&mut self, position: u64) {
        self.cursor.set_position(position);
    }

    /// Total length of the underlying data
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    /// Check if the underlying data is empty
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Bytes left after the current position
    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    /// Skip to the next multiple of `alignment`
    pub fn align(&mut self, alignment: u64) {
        let rem = self.position() % alignment;
        if rem != 0 {
            self.set_position(self.position() + alignment - rem);
        }
    }

    /// Skip `count` bytes
    pub fn skip(&mut self, count: i64) -> Result<()> {
        self.cursor
            .seek(SeekFrom::Current(count))
            .map_err(binrw::Error::from)?;
        Ok(())
    }

    /// Read a byte
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.cursor.read_type(self.endian)?)
    }

    /// Read a one-byte boolean
    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    /// Read an `i16`
    pub fn i16(&mut self) -> Result<i16> {
        Ok(self.cursor.read_type(self.endian)?)
    }

    /// Read a `u16`
    pub fn u16(&mut self) -> Result<u16> {
        Ok(self.cursor.read_type(self.endian)?)
    }

    /// Read an `i32`
    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.cursor.read_type(self.endian)?)
    }

    /// Read a `u32`
    pub fn u32(&mut self) -> Result<u32> {
        Ok(self.cursor.read_type(self.endian)?)
    }

    /// Read an `i64`
    pub fn i64(&mut self) -> Result<i64> {
        Ok(self.cursor.read_type(self.endian)?)
    }

    /// Read a fixed-size byte array
    pub fn bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        Ok(self.cursor.read_type(self.endian)?)
    }

    /// Read a null-terminated string
    pub fn cstring(&mut self) -> Result<String> {
        let s: NullString = self.cursor.read_type(self.endian)?;
        Ok(s.to_string())
    }

    /// Read an `i32` count, rejecting negative values
    pub fn count(&mut self, what: &'static str) -> Result<usize> {
        let count = self.i32()?;
        count_from(what, count)
    }

    /// Read an `i32` count of records that are at least `min_record` bytes each
    ///
    /// Counts the remaining data cannot hold are rejected before any table is
    /// allocated.
    pub fn table_count(&mut self, what: &'static str, min_record: u64) -> Result<usize> {
        let raw = self.i32()?;
        let count = count_from(what, raw)?;
        if (count as u64).saturating_mul(min_record) > self.remaining() {
            return Err(SerializedError::InvalidCount { what, count: raw });
        }
        Ok(count)
    }

    /// Read a length-prefixed string padded to four bytes
    ///
    /// A length that is not positive or runs past the end yields an empty string
    /// and leaves the reader just after the length field.
    pub fn aligned_string(&mut self) -> Result<String> {
        let len = self.i32()?;
        let Ok(len) = u64::try_from(len) else {
            return Ok(String::new());
        };
        if len == 0 || len > self.remaining() {
            return Ok(String::new());
        }

        let start = self.position() as usize;
        let end = start + len as usize;
        let text = String::from_utf8_lossy(&self.cursor.get_ref()[start..end]).into_owned();
        self.set_position(end as u64);
        self.align(4);
        Ok(text)
    }
}

fn count_from(what: &'static str, count: i32) -> Result<usize> {
    usize::try_from(count).map_err(|_| SerializedError::InvalidCount { what, count })
}

/// Primitive writer, the counterpart of [`StreamReader`]
#[derive(Debug, Clone)]
pub struct StreamWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl StreamWriter {
    /// Create an empty writer
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Switch byte order for subsequent writes
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Finish and return the bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn put(&mut self, little: &[u8], big: &[u8]) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(little),
            Endian::Big => self.buf.extend_from_slice(big),
        }
    }

    /// Zero-pad to the next multiple of `alignment`
    pub fn align(&mut self, alignment: usize) {
        let rem = self.buf.len() % alignment;
        if rem != 0 {
            self.buf.resize(self.buf.len() + alignment - rem, 0);
        }
    }

    /// Write a byte
    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Write an `i16`
    pub fn i16(&mut self, v: i16) {
        self.put(&v.to_le_bytes(), &v.to_be_bytes());
    }

    /// Write a `u16`
    pub fn u16(&mut self, v: u16) {
        self.put(&v.to_le_bytes(), &v.to_be_bytes());
    }

    /// Write an `i32`
    pub fn i32(&mut self, v: i32) {
        self.put(&v.to_le_bytes(), &v.to_be_bytes());
    }

    /// Write a `u32`
    pub fn u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes(), &v.to_be_bytes());
    }

    /// Write an `i64`
    pub fn i64(&mut self, v: i64) {
        self.put(&v.to_le_bytes(), &v.to_be_bytes());
    }

    /// Write raw bytes
    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    /// Write a null-terminated string
    pub fn cstring(&mut self, v: &str) {
        self.buf.extend_from_slice(v.as_bytes());
        self.buf.push(0);
    }

    /// Write a length-prefixed string padded to four bytes
    pub fn aligned_string(&mut self, v: &str) {
        self.i32(v.len() as i32);
        self.bytes(v.as_bytes());
        self.align(4);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_both_endians() {
        for endian in [Endian::Little, Endian::Big] {
            let mut writer = StreamWriter::new(endian);
            writer.u8(7);
            writer.i16(-2);
            writer.u32(0xDEAD_BEEF);
            writer.i64(-1_234_567_890_123);
            writer.cstring("CAB-1");

            let bytes = writer.into_inner();
            let mut reader = StreamReader::new(&bytes, endian);
            assert_eq!(reader.u8().unwrap(), 7);
            assert_eq!(reader.i16().unwrap(), -2);
            assert_eq!(reader.u32().unwrap(), 0xDEAD_BEEF);
            assert_eq!(reader.i64().unwrap(), -1_234_567_890_123);
            assert_eq!(reader.cstring().unwrap(), "CAB-1");
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_aligned_string_padding() {
        let mut writer = StreamWriter::new(Endian::Little);
        writer.aligned_string("abcde");
        writer.i32(42);
        let bytes = writer.into_inner();
        // 4 length + 5 text + 3 padding + 4
        assert_eq!(bytes.len(), 16);

        let mut reader = StreamReader::new(&bytes, Endian::Little);
        assert_eq!(reader.aligned_string().unwrap(), "abcde");
        assert_eq!(reader.i32().unwrap(), 42);
    }

    #[test]
    fn test_aligned_string_bad_length_is_empty() {
        let mut writer = StreamWriter::new(Endian::Little);
        writer.i32(1000);
        let bytes = writer.into_inner();
        let mut reader = StreamReader::new(&bytes, Endian::Little);
        assert_eq!(reader.aligned_string().unwrap(), "");
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_negative_count_rejected() {
        let mut writer = StreamWriter::new(Endian::Little);
        writer.i32(-1);
        let bytes = writer.into_inner();
        let mut reader = StreamReader::new(&bytes, Endian::Little);
        assert!(matches!(
            reader.count("object"),
            Err(SerializedError::InvalidCount { count: -1, .. })
        ));
    }
}
