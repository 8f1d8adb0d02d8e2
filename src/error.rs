//! Error types for async-snmp-agent.
//!
//! Expected protocol outcomes (unknown community, access denied, missing
//! objects) are modelled as variants the caller matches on. Only genuinely
//! unexpected faults, such as failing to bind the transport or to open
//! persisted state, are fatal, and only at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use bytes::Bytes;

use crate::oid::Oid;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a datagram failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeErrorKind {
    #[error("expected tag 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedTag { expected: u8, actual: u8 },
    #[error("unexpected end of data")]
    TruncatedData,
    #[error("invalid length encoding")]
    InvalidLength,
    #[error("indefinite length encoding not supported")]
    IndefiniteLength,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("zero-length integer")]
    ZeroLengthInteger,
    #[error("unknown SNMP version: {0}")]
    UnknownVersion(i32),
    #[error("unknown PDU type: 0x{0:02X}")]
    UnknownPduType(u8),
    #[error("unknown value tag: 0x{0:02X}")]
    UnknownValueTag(u8),
    #[error("constructed OCTET STRING not supported")]
    ConstructedOctetString,
    #[error("NULL with non-zero length")]
    InvalidNull,
    #[error("IpAddress must be 4 octets, got {length}")]
    InvalidIpAddressLength { length: usize },
    #[error("length field of {octets} octets")]
    LengthTooLong { octets: usize },
    #[error("TLV extends past end of data")]
    TlvOverflow,
    #[error("trailing data after message")]
    TrailingData,
    /// GETBULK non-repeaters or max-repetitions below zero.
    #[error("negative GETBULK field: {value}")]
    NegativeBulkField { value: i32 },
}

/// Why an OID was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OidErrorKind {
    #[error("empty OID")]
    Empty,
    #[error("invalid arc value")]
    InvalidArc,
    #[error("first arc must be 0, 1 or 2, got {0}")]
    InvalidFirstArc(u32),
    #[error("second arc {second} too large under first arc {first}")]
    InvalidSecondArc { first: u32, second: u32 },
    #[error("{count} arcs exceeds the maximum of {max}")]
    TooManyArcs { count: usize, max: usize },
    #[error("subidentifier overflow")]
    SubidentifierOverflow,
}

/// PDU error-status values (RFC 3416 Section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// A code outside 0..=18.
    Unknown(i32),
}

impl ErrorStatus {
    /// Defined statuses, indexed by wire code, with their MIB names.
    const DEFINED: [(ErrorStatus, &'static str); 19] = [
        (Self::NoError, "noError"),
        (Self::TooBig, "tooBig"),
        (Self::NoSuchName, "noSuchName"),
        (Self::BadValue, "badValue"),
        (Self::ReadOnly, "readOnly"),
        (Self::GenErr, "genErr"),
        (Self::NoAccess, "noAccess"),
        (Self::WrongType, "wrongType"),
        (Self::WrongLength, "wrongLength"),
        (Self::WrongEncoding, "wrongEncoding"),
        (Self::WrongValue, "wrongValue"),
        (Self::NoCreation, "noCreation"),
        (Self::InconsistentValue, "inconsistentValue"),
        (Self::ResourceUnavailable, "resourceUnavailable"),
        (Self::CommitFailed, "commitFailed"),
        (Self::UndoFailed, "undoFailed"),
        (Self::AuthorizationError, "authorizationError"),
        (Self::NotWritable, "notWritable"),
        (Self::InconsistentName, "inconsistentName"),
    ];

    /// Wire code of `genErr`.
    const GEN_ERR_CODE: i32 = 5;

    pub fn from_i32(value: i32) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(|code| Self::DEFINED.get(code))
            .map_or(Self::Unknown(value), |(status, _)| *status)
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Unknown(code) => *code,
            defined => Self::DEFINED
                .iter()
                .position(|(status, _)| status == defined)
                .map_or(Self::GEN_ERR_CODE, |code| code as i32),
        }
    }

    /// Map an SNMPv2 error status onto the SNMPv1 set (RFC 3584 Section 4.4).
    pub fn to_v1(self) -> Self {
        match self {
            Self::NoError
            | Self::TooBig
            | Self::NoSuchName
            | Self::BadValue
            | Self::ReadOnly
            | Self::GenErr => self,
            Self::WrongValue
            | Self::WrongEncoding
            | Self::WrongType
            | Self::WrongLength
            | Self::InconsistentValue => Self::BadValue,
            Self::NoAccess
            | Self::NotWritable
            | Self::NoCreation
            | Self::InconsistentName
            | Self::AuthorizationError => Self::NoSuchName,
            Self::ResourceUnavailable | Self::CommitFailed | Self::UndoFailed | Self::Unknown(_) => {
                Self::GenErr
            }
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match Self::DEFINED.iter().find(|(status, _)| status == self) {
            Some((_, name)) => f.write_str(name),
            None => write!(f, "unknown({})", self.as_i32()),
        }
    }
}

/// Managed Object Store registration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// The object's OID range overlaps an existing registration.
    #[error("duplicate registration: {oid} overlaps {existing} in context {:?}", String::from_utf8_lossy(context))]
    DuplicateRegistration {
        oid: Oid,
        existing: Oid,
        context: Bytes,
    },

    /// No object is registered at this OID.
    #[error("not registered: {oid} in context {:?}", String::from_utf8_lossy(context))]
    NotRegistered { oid: Oid, context: Bytes },

    /// The context has not been added to the store.
    #[error("unknown context {:?}", String::from_utf8_lossy(context))]
    UnknownContext { context: Bytes },
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error on the agent transport.
    #[error("I/O error{}: {source}", target.map(|t| format!(" on {}", t)).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Invalid OID format.
    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>, // Only allocated when parsing string input
    },

    /// BER decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// Managed object registration failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Community or principal is not in the security mapping table.
    #[error("unknown security identity {:?}", String::from_utf8_lossy(name))]
    UnknownSecurityIdentity { name: Bytes },

    /// Access control refused the principal outright.
    #[error("access denied: {0}")]
    Access(#[from] crate::agent::AccessDenied),

    /// Reading or writing persisted agent state failed.
    #[error("state file {}: {source}", path.display())]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted agent state could not be parsed.
    #[error("state file {} is malformed: {source}", path.display())]
    StateFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid agent configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an invalid OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error with the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// Get the transport address if this error has one.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. } => *target,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        for code in 0..=18 {
            let status = ErrorStatus::from_i32(code);
            assert!(!matches!(status, ErrorStatus::Unknown(_)));
            assert_eq!(status.as_i32(), code);
            assert_eq!(ErrorStatus::from_i32(status.as_i32()), status);
        }
        assert_eq!(ErrorStatus::NoError.as_i32(), 0);
        assert_eq!(ErrorStatus::GenErr.as_i32(), ErrorStatus::GEN_ERR_CODE);
        assert_eq!(ErrorStatus::InconsistentName.as_i32(), 18);
        assert_eq!(ErrorStatus::from_i32(16), ErrorStatus::AuthorizationError);
        assert_eq!(ErrorStatus::from_i32(-1), ErrorStatus::Unknown(-1));
        assert_eq!(ErrorStatus::Unknown(99).as_i32(), 99);
        assert_eq!(ErrorStatus::NotWritable.to_string(), "notWritable");
        assert_eq!(ErrorStatus::Unknown(99).to_string(), "unknown(99)");
    }

    #[test]
    fn test_error_status_to_v1() {
        assert_eq!(ErrorStatus::NoAccess.to_v1(), ErrorStatus::NoSuchName);
        assert_eq!(ErrorStatus::NotWritable.to_v1(), ErrorStatus::NoSuchName);
        assert_eq!(
            ErrorStatus::AuthorizationError.to_v1(),
            ErrorStatus::NoSuchName
        );
        assert_eq!(ErrorStatus::WrongType.to_v1(), ErrorStatus::BadValue);
        assert_eq!(ErrorStatus::WrongLength.to_v1(), ErrorStatus::BadValue);
        assert_eq!(ErrorStatus::CommitFailed.to_v1(), ErrorStatus::GenErr);
        assert_eq!(ErrorStatus::TooBig.to_v1(), ErrorStatus::TooBig);
    }

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::NotRegistered {
            oid: crate::oid!(1, 3, 6, 1),
            context: Bytes::new(),
        };
        assert_eq!(err.to_string(), "not registered: 1.3.6.1 in context \"\"");
    }
}
