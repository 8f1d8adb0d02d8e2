//! BER encoding into a back-to-front buffer.
//!
//! Contents are written before their header, so a constructed value's
//! length is known by the time its length octets are written. The buffer is
//! reversed once in [`EncodeBuf::finish`].

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

/// Reverse BER writer. Encode children last-to-first.
#[derive(Debug, Default)]
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(512),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Prepend raw octets, keeping their order in the final output.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    fn push_header(&mut self, tag: u8, len: usize) {
        let (octets, count) = encode_length(len);
        // already reversed
        self.buf.extend_from_slice(&octets[..count]);
        self.buf.push(tag);
    }

    /// A primitive TLV.
    pub fn push_primitive(&mut self, tag: u8, content: &[u8]) {
        self.push_bytes(content);
        self.push_header(tag, content.len());
    }

    /// A constructed TLV whose contents `f` writes (last child first).
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let before = self.buf.len();
        f(self);
        let len = self.buf.len() - before;
        self.push_header(tag, len);
    }

    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    pub fn push_integer(&mut self, value: i32) {
        self.push_primitive(tag::universal::INTEGER, minimal(&value.to_be_bytes()));
    }

    /// Counter32, Gauge32 or TimeTicks.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        self.push_primitive(tag, minimal(&unsigned_octets(u64::from(value))));
    }

    pub fn push_counter64(&mut self, value: u64) {
        self.push_primitive(
            tag::application::COUNTER64,
            minimal(&unsigned_octets(value)),
        );
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_primitive(tag::universal::OCTET_STRING, data);
    }

    pub fn push_null(&mut self) {
        self.push_primitive(tag::universal::NULL, &[]);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        self.push_primitive(tag::universal::OBJECT_IDENTIFIER, &oid.to_ber_smallvec());
    }

    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_primitive(tag::application::IP_ADDRESS, &addr);
    }

    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }
}

/// Zero-extended big-endian octets, so the sign bit is never set.
fn unsigned_octets(value: u64) -> [u8; 9] {
    let mut out = [0u8; 9];
    out[1..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Strip leading octets that only repeat the sign (X.690 Section 8.3.2).
fn minimal(octets: &[u8]) -> &[u8] {
    let redundant = octets
        .windows(2)
        .take_while(|pair| {
            (pair[0] == 0x00 && pair[1] & 0x80 == 0) || (pair[0] == 0xFF && pair[1] & 0x80 != 0)
        })
        .count();
    &octets[redundant..]
}
