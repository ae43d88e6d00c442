//! Bounded cursor over one framed packet body

use bytes::Bytes;

use crate::protocol::ParseFailure;

/// Cursor over exactly one packet body.
///
/// Every read is bounds-checked against the framed remaining length, so a
/// malformed length prefix inside the body surfaces as
/// [`ParseFailure::OutOfData`] rather than reading into the next packet.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total body length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ParseFailure> {
        if n > self.remaining() {
            return Err(ParseFailure::OutOfData {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Consume everything left in the body
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseFailure> {
        Ok(self.take(1)?[0])
    }

    /// Read a Two Byte Integer (u16 big-endian)
    pub fn read_u16(&mut self) -> Result<u16, ParseFailure> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a length-prefixed UTF-8 string.
    ///
    /// U+FEFF is kept as is [MQTT-1.5.3-3].
    pub fn read_string(&mut self) -> Result<String, ParseFailure> {
        let len = self.read_u16()? as usize;
        let raw = self.take(len)?;
        let s = std::str::from_utf8(raw).map_err(|_| {
            if contains_surrogate(raw) {
                ParseFailure::Surrogates
            } else {
                ParseFailure::InvalidUtf8
            }
        })?;

        if s.contains('\0') {
            return Err(ParseFailure::NullCharacter);
        }

        Ok(s.to_string())
    }

    /// Read length-prefixed binary data
    pub fn read_prefixed_data(&mut self) -> Result<Bytes, ParseFailure> {
        let len = self.read_u16()? as usize;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }
}

/// Lead byte 0xED with a continuation in 0xA0..=0xBF encodes U+D800..U+DFFF
fn contains_surrogate(raw: &[u8]) -> bool {
    raw.windows(2)
        .any(|w| w[0] == 0xED && (0xA0..=0xBF).contains(&w[1]))
}
