//! Community-based SNMP messages (v1 and v2c).
//!
//! ```text
//! Message ::= SEQUENCE {
//!     version    INTEGER,
//!     community  OCTET STRING,
//!     data       PDU
//! }
//! ```
//!
//! SNMPv3 messages share the outer SEQUENCE and version field but nothing
//! else; [`peek_version`] lets the listener recognise and drop them without
//! a USM engine.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::{Pdu, TrapV1Pdu};
use crate::version::Version;

/// Security level (RFC 3411). Ordered from weakest to strongest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum SecurityLevel {
    /// No authentication, no privacy. The only level v1/v2c requests carry.
    #[default]
    NoAuthNoPriv = 1,
    /// Authentication without privacy.
    AuthNoPriv = 2,
    /// Authentication and privacy.
    AuthPriv = 3,
}

/// PDU carried by a community message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePdu {
    Pdu(Pdu),
    TrapV1(TrapV1Pdu),
}

impl MessagePdu {
    fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            MessagePdu::Pdu(pdu) => pdu.encode(buf),
            MessagePdu::TrapV1(trap) => trap.encode(buf),
        }
    }
}

/// An SNMPv1 or SNMPv2c message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityMessage {
    pub version: Version,
    pub community: Bytes,
    pub pdu: MessagePdu,
}

impl CommunityMessage {
    /// Create a message carrying a generic PDU.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version,
            community: community.into(),
            pdu: MessagePdu::Pdu(pdu),
        }
    }

    /// Create an SNMPv1 trap message.
    pub fn trap_v1(community: impl Into<Bytes>, trap: TrapV1Pdu) -> Self {
        Self {
            version: Version::V1,
            community: community.into(),
            pdu: MessagePdu::TrapV1(trap),
        }
    }

    /// Encode to a complete datagram.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });
        buf.finish()
    }

    /// Decode a complete datagram.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut outer = Decoder::new(data);
        let mut seq = outer.read_sequence()?;
        if !outer.is_empty() {
            return Err(Error::decode(outer.offset(), DecodeErrorKind::TrailingData));
        }

        let offset = seq.offset();
        let raw = seq.read_integer()?;
        let version = match Version::from_i32(raw) {
            Some(v @ (Version::V1 | Version::V2c)) => v,
            _ => return Err(Error::decode(offset, DecodeErrorKind::UnknownVersion(raw))),
        };
        let community = seq.read_octet_string()?;

        let pdu = if seq.peek_tag() == Some(tag::pdu::TRAP_V1) {
            MessagePdu::TrapV1(TrapV1Pdu::decode(&mut seq)?)
        } else {
            MessagePdu::Pdu(Pdu::decode(&mut seq)?)
        };

        Ok(Self {
            version,
            community,
            pdu,
        })
    }
}

/// Read only the version field of a datagram.
pub fn peek_version(data: &Bytes) -> Result<Version> {
    let mut outer = Decoder::new(data.clone());
    let mut seq = outer.read_sequence()?;
    let offset = seq.offset();
    let raw = seq.read_integer()?;
    Version::from_i32(raw).ok_or_else(|| Error::decode(offset, DecodeErrorKind::UnknownVersion(raw)))
}
