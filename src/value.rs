//! SNMP values and SMI syntax kinds.
//!
//! [`Value`] is what travels in a varbind, including the three SNMPv2
//! exception values. [`Syntax`] is the declared type of a managed object
//! and is what SET validation checks incoming values against.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// SNMP value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// INTEGER (Integer32).
    Integer(i32),
    /// OCTET STRING.
    OctetString(Bytes),
    /// NULL, used as the placeholder value in requests.
    Null,
    /// OBJECT IDENTIFIER.
    ObjectIdentifier(Oid),
    /// IpAddress.
    IpAddress([u8; 4]),
    /// Counter32.
    Counter32(u32),
    /// Gauge32 / Unsigned32.
    Gauge32(u32),
    /// TimeTicks, hundredths of a second.
    TimeTicks(u32),
    /// Opaque.
    Opaque(Bytes),
    /// Counter64. Not visible to SNMPv1 managers.
    Counter64(u64),
    /// noSuchObject exception.
    NoSuchObject,
    /// noSuchInstance exception.
    NoSuchInstance,
    /// endOfMibView exception.
    EndOfMibView,
}

impl Value {
    /// Whether this is one of the SNMPv2 exception values.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// The SMI syntax of this value, or `None` for NULL and exceptions.
    pub fn syntax(&self) -> Option<Syntax> {
        Some(match self {
            Value::Integer(_) => Syntax::Integer,
            Value::OctetString(_) => Syntax::OctetString,
            Value::ObjectIdentifier(_) => Syntax::ObjectIdentifier,
            Value::IpAddress(_) => Syntax::IpAddress,
            Value::Counter32(_) => Syntax::Counter32,
            Value::Gauge32(_) => Syntax::Gauge32,
            Value::TimeTicks(_) => Syntax::TimeTicks,
            Value::Opaque(_) => Syntax::Opaque,
            Value::Counter64(_) => Syntax::Counter64,
            Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
                return None;
            }
        })
    }

    /// Raw octets of an OCTET STRING or Opaque value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(b) | Value::Opaque(b) => Some(b),
            _ => None,
        }
    }

    /// OCTET STRING content as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::OctetString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Integer content of any numeric syntax, widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(i64::from(*v)),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(i64::from(*v)),
            Value::Counter64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => buf.push_primitive(tag::application::OPAQUE, data),
            Value::Counter64(v) => buf.push_counter64(*v),
            Value::NoSuchObject => buf.push_primitive(tag::context::NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => buf.push_primitive(tag::context::NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => buf.push_primitive(tag::context::END_OF_MIB_VIEW, &[]),
        }
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let offset = decoder.offset();
        let tag = decoder
            .peek_tag()
            .ok_or_else(|| Error::decode(offset, DecodeErrorKind::TruncatedData))?;

        match tag {
            tag::universal::INTEGER => decoder.read_integer().map(Value::Integer),
            tag::universal::OCTET_STRING | tag::universal::OCTET_STRING_CONSTRUCTED => {
                decoder.read_octet_string().map(Value::OctetString)
            }
            tag::universal::NULL => decoder.read_null().map(|()| Value::Null),
            tag::universal::OBJECT_IDENTIFIER => decoder.read_oid().map(Value::ObjectIdentifier),
            tag::application::IP_ADDRESS => decoder.read_ip_address().map(Value::IpAddress),
            tag::application::COUNTER32 => decoder.read_unsigned32(tag).map(Value::Counter32),
            tag::application::GAUGE32 => decoder.read_unsigned32(tag).map(Value::Gauge32),
            tag::application::TIMETICKS => decoder.read_unsigned32(tag).map(Value::TimeTicks),
            tag::application::OPAQUE => decoder.read_expected(tag).map(Value::Opaque),
            tag::application::COUNTER64 => decoder.read_counter64().map(Value::Counter64),
            tag::context::NO_SUCH_OBJECT
            | tag::context::NO_SUCH_INSTANCE
            | tag::context::END_OF_MIB_VIEW => {
                decoder.read_expected(tag)?;
                Ok(match tag {
                    tag::context::NO_SUCH_OBJECT => Value::NoSuchObject,
                    tag::context::NO_SUCH_INSTANCE => Value::NoSuchInstance,
                    _ => Value::EndOfMibView,
                })
            }
            other => Err(Error::decode(offset, DecodeErrorKind::UnknownValueTag(other))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) if s.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
                    write!(f, "{}", s)
                }
                _ => {
                    for (i, b) in data.iter().enumerate() {
                        if i > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{:02X}", b)?;
                    }
                    Ok(())
                }
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => write!(f, "({})", v),
            Value::Opaque(data) => write!(f, "Opaque({} bytes)", data.len()),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

/// SMI syntax kind of a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Syntax {
    Integer,
    OctetString,
    ObjectIdentifier,
    IpAddress,
    Counter32,
    Gauge32,
    TimeTicks,
    Opaque,
    Counter64,
}

impl Syntax {
    /// Whether `value` is an instance of this syntax.
    pub fn accepts(self, value: &Value) -> bool {
        value.syntax() == Some(self)
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Syntax::Integer => "INTEGER",
            Syntax::OctetString => "OCTET STRING",
            Syntax::ObjectIdentifier => "OBJECT IDENTIFIER",
            Syntax::IpAddress => "IpAddress",
            Syntax::Counter32 => "Counter32",
            Syntax::Gauge32 => "Gauge32",
            Syntax::TimeTicks => "TimeTicks",
            Syntax::Opaque => "Opaque",
            Syntax::Counter64 => "Counter64",
        };
        f.write_str(name)
    }
}
