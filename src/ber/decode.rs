//! BER decoding.
//!
//! A [`Decoder`] is a cursor over a shared [`Bytes`] buffer. Constructed
//! types return a child decoder scoped to their contents, so slicing never
//! copies.

use bytes::Bytes;

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// Cursor-based BER decoder.
#[derive(Debug, Clone)]
pub struct Decoder {
    data: Bytes,
    pos: usize,
    /// Absolute offset of `data[0]` in the original message, for error reporting.
    base: usize,
}

impl Decoder {
    /// Create a decoder over a complete buffer.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Absolute offset of the cursor in the original message.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Whether all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn error(&self, kind: DecodeErrorKind) -> Error {
        Error::decode(self.offset(), kind)
    }

    /// Read a tag byte.
    pub fn read_tag(&mut self) -> Result<u8> {
        let tag = self
            .peek_tag()
            .ok_or_else(|| self.error(DecodeErrorKind::TruncatedData))?;
        self.pos += 1;
        Ok(tag)
    }

    /// Read a length field.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.pos..], self.offset())?;
        self.pos += consumed;
        if len > self.remaining() {
            return Err(self.error(DecodeErrorKind::TlvOverflow));
        }
        Ok(len)
    }

    /// Read the next TLV and return its tag and content.
    pub fn read_tlv(&mut self) -> Result<(u8, Bytes)> {
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        let content = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok((tag, content))
    }

    /// Read a TLV with the expected tag and return its content.
    pub fn read_expected(&mut self, expected: u8) -> Result<Bytes> {
        let offset = self.offset();
        let tag = self.read_tag()?;
        if tag != expected {
            return Err(Error::decode(
                offset,
                DecodeErrorKind::UnexpectedTag {
                    expected,
                    actual: tag,
                },
            ));
        }
        let len = self.read_length()?;
        let content = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(content)
    }

    /// Read a constructed type with the given tag and return a child decoder.
    pub fn read_constructed(&mut self, expected: u8) -> Result<Decoder> {
        let base = self.base + self.pos;
        let content = self.read_expected(expected)?;
        // Child offsets start after tag + length
        let header = self.offset() - base - content.len();
        Ok(Decoder {
            data: content,
            pos: 0,
            base: base + header,
        })
    }

    /// Read a SEQUENCE and return a child decoder.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read an INTEGER.
    pub fn read_integer(&mut self) -> Result<i32> {
        let offset = self.offset();
        let content = self.read_expected(tag::universal::INTEGER)?;
        decode_i32(&content, offset)
    }

    /// Read an unsigned 32-bit integer under the given tag.
    pub fn read_unsigned32(&mut self, expected: u8) -> Result<u32> {
        let offset = self.offset();
        let content = self.read_expected(expected)?;
        decode_u64(&content, offset).and_then(|v| {
            u32::try_from(v).map_err(|_| Error::decode(offset, DecodeErrorKind::IntegerOverflow))
        })
    }

    /// Read a Counter64.
    pub fn read_counter64(&mut self) -> Result<u64> {
        let offset = self.offset();
        let content = self.read_expected(tag::application::COUNTER64)?;
        decode_u64(&content, offset)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        if self.peek_tag() == Some(tag::universal::OCTET_STRING_CONSTRUCTED) {
            return Err(self.error(DecodeErrorKind::ConstructedOctetString));
        }
        self.read_expected(tag::universal::OCTET_STRING)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let offset = self.offset();
        let content = self.read_expected(tag::universal::NULL)?;
        if !content.is_empty() {
            return Err(Error::decode(offset, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let content = self.read_expected(tag::universal::OBJECT_IDENTIFIER)?;
        Oid::from_ber(&content)
    }

    /// Read an IpAddress.
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let offset = self.offset();
        let content = self.read_expected(tag::application::IP_ADDRESS)?;
        <[u8; 4]>::try_from(content.as_ref()).map_err(|_| {
            Error::decode(
                offset,
                DecodeErrorKind::InvalidIpAddressLength {
                    length: content.len(),
                },
            )
        })
    }
}

/// Decode a two's complement INTEGER into an i32.
pub(crate) fn decode_i32(content: &[u8], offset: usize) -> Result<i32> {
    if content.is_empty() {
        return Err(Error::decode(offset, DecodeErrorKind::ZeroLengthInteger));
    }
    // Permissive: strip redundant sign octets before checking width
    let mut bytes = content;
    while bytes.len() > 4
        && ((bytes[0] == 0x00 && bytes[1] & 0x80 == 0) || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0))
    {
        bytes = &bytes[1..];
    }
    if bytes.len() > 4 {
        return Err(Error::decode(offset, DecodeErrorKind::IntegerOverflow));
    }

    let mut value: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in bytes {
        value = (value << 8) | i32::from(b);
    }
    Ok(value)
}

/// Decode an unsigned INTEGER, tolerating leading zero octets.
fn decode_u64(content: &[u8], offset: usize) -> Result<u64> {
    if content.is_empty() {
        return Err(Error::decode(offset, DecodeErrorKind::ZeroLengthInteger));
    }
    let mut bytes = content;
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes = &bytes[1..];
    }
    if bytes.len() > 8 {
        return Err(Error::decode(offset, DecodeErrorKind::IntegerOverflow));
    }
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}
