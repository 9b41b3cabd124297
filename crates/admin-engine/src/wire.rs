//! Big-endian wire primitives for the broker admin protocol: INT8/16/32,
//! BOOLEAN, and length-prefixed STRING / ARRAY headers (length `-1` encodes
//! null).

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Decode failure raised by [`WireReader`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The buffer ended before the field did.
    #[error("truncated buffer reading {what}")]
    Truncated {
        /// Field being read.
        what: &'static str,
    },
    /// A length prefix was outside the representable range.
    #[error("invalid length {len} for {what}")]
    InvalidLength {
        /// Field being read.
        what: &'static str,
        /// The offending length.
        len: i32,
    },
    /// A string field was not valid UTF-8.
    #[error("{what} is not valid utf-8")]
    Utf8 {
        /// Field being read.
        what: &'static str,
    },
}

impl From<WireError> for String {
    fn from(err: WireError) -> Self {
        err.to_string()
    }
}

/// Append-only encoder for request bodies.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an INT8.
    pub fn put_i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    /// Append an INT16.
    pub fn put_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    /// Append an INT32.
    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    /// Append a BOOLEAN.
    pub fn put_bool(&mut self, v: bool) {
        self.buf.put_i8(v as i8);
    }

    /// Append a STRING (INT16 length + bytes).
    pub fn put_str(&mut self, s: &str) {
        debug_assert!(s.len() <= i16::MAX as usize);
        self.buf.put_i16(s.len() as i16);
        self.buf.put_slice(s.as_bytes());
    }

    /// Append a NULLABLE_STRING (`None` encodes as length `-1`).
    pub fn put_nullable_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => self.put_str(s),
            None => self.buf.put_i16(-1),
        }
    }

    /// Append an ARRAY length header.
    pub fn put_array_len(&mut self, len: usize) {
        debug_assert!(len <= i32::MAX as usize);
        self.buf.put_i32(len as i32);
    }

    /// Append a null ARRAY header.
    pub fn put_null_array(&mut self) {
        self.buf.put_i32(-1);
    }

    /// Finish encoding and take the body.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Consuming decoder for response bodies.
#[derive(Debug)]
pub struct WireReader {
    buf: Bytes,
}

impl WireReader {
    /// Reader over `buf`.
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Bytes left unread.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize, what: &'static str) -> Result<(), WireError> {
        if self.buf.remaining() < n {
            return Err(WireError::Truncated { what });
        }
        Ok(())
    }

    /// Read an INT8.
    pub fn read_i8(&mut self, what: &'static str) -> Result<i8, WireError> {
        self.need(1, what)?;
        Ok(self.buf.get_i8())
    }

    /// Read an INT16.
    pub fn read_i16(&mut self, what: &'static str) -> Result<i16, WireError> {
        self.need(2, what)?;
        Ok(self.buf.get_i16())
    }

    /// Read an INT32.
    pub fn read_i32(&mut self, what: &'static str) -> Result<i32, WireError> {
        self.need(4, what)?;
        Ok(self.buf.get_i32())
    }

    /// Read a BOOLEAN (any non-zero byte is true).
    pub fn read_bool(&mut self, what: &'static str) -> Result<bool, WireError> {
        Ok(self.read_i8(what)? != 0)
    }

    /// Read a non-null STRING.
    pub fn read_str(&mut self, what: &'static str) -> Result<String, WireError> {
        self.read_nullable_str(what)?
            .ok_or(WireError::InvalidLength { what, len: -1 })
    }

    /// Read a NULLABLE_STRING.
    pub fn read_nullable_str(&mut self, what: &'static str) -> Result<Option<String>, WireError> {
        let len = self.read_i16(what)?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(WireError::InvalidLength {
                what,
                len: len as i32,
            });
        }
        self.need(len as usize, what)?;
        let raw = self.buf.split_to(len as usize);
        let s = std::str::from_utf8(&raw).map_err(|_| WireError::Utf8 { what })?;
        Ok(Some(s.to_string()))
    }

    /// Read a non-null ARRAY length header.
    pub fn read_array_len(&mut self, what: &'static str) -> Result<i32, WireError> {
        let len = self.read_i32(what)?;
        if len < 0 {
            return Err(WireError::InvalidLength { what, len });
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_and_scalars() {
        let mut w = WireWriter::new();
        w.put_str("abc");
        w.put_nullable_str(None);
        w.put_i16(7);
        w.put_bool(true);

        let mut r = WireReader::new(w.finish());
        assert_eq!(r.read_str("s").unwrap(), "abc");
        assert_eq!(r.read_nullable_str("n").unwrap(), None);
        assert_eq!(r.read_i16("i").unwrap(), 7);
        assert!(r.read_bool("b").unwrap());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_reads_fail() {
        let mut w = WireWriter::new();
        w.put_i16(300); // String header promising more than the buffer holds.
        let mut r = WireReader::new(w.finish());
        assert_eq!(
            r.read_str("topic"),
            Err(WireError::Truncated { what: "topic" })
        );

        let mut r = WireReader::new(Bytes::from_static(&[0x00]));
        assert!(matches!(
            r.read_i32("count"),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn null_array_header_rejected_in_responses() {
        let mut w = WireWriter::new();
        w.put_null_array();
        let mut r = WireReader::new(w.finish());
        assert_eq!(
            r.read_array_len("topics"),
            Err(WireError::InvalidLength {
                what: "topics",
                len: -1
            })
        );
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut buf = BytesMut::new();
        buf.put_i16(2);
        buf.put_slice(&[0xff, 0xfe]);
        let mut r = WireReader::new(buf.freeze());
        assert_eq!(r.read_str("name"), Err(WireError::Utf8 { what: "name" }));
    }
}
