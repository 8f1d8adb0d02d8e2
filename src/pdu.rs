//! SNMP Protocol Data Units.
//!
//! [`Pdu`] covers every PDU sharing the request-id / error-status /
//! error-index layout (RFC 3416), including GETBULK, whose two middle fields
//! carry non-repeaters and max-repetitions instead. The SNMPv1 trap has its
//! own layout and is [`TrapV1Pdu`].

use std::fmt;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type, identified on the wire by its context-specific tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    TrapV1,
    GetBulkRequest,
    InformRequest,
    TrapV2,
    Report,
}

impl PduType {
    /// The BER tag of this PDU type.
    pub const fn tag(self) -> u8 {
        match self {
            PduType::GetRequest => tag::pdu::GET_REQUEST,
            PduType::GetNextRequest => tag::pdu::GET_NEXT_REQUEST,
            PduType::Response => tag::pdu::RESPONSE,
            PduType::SetRequest => tag::pdu::SET_REQUEST,
            PduType::TrapV1 => tag::pdu::TRAP_V1,
            PduType::GetBulkRequest => tag::pdu::GET_BULK_REQUEST,
            PduType::InformRequest => tag::pdu::INFORM_REQUEST,
            PduType::TrapV2 => tag::pdu::TRAP_V2,
            PduType::Report => tag::pdu::REPORT,
        }
    }

    /// Look up a PDU type by tag.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            tag::pdu::GET_REQUEST => PduType::GetRequest,
            tag::pdu::GET_NEXT_REQUEST => PduType::GetNextRequest,
            tag::pdu::RESPONSE => PduType::Response,
            tag::pdu::SET_REQUEST => PduType::SetRequest,
            tag::pdu::TRAP_V1 => PduType::TrapV1,
            tag::pdu::GET_BULK_REQUEST => PduType::GetBulkRequest,
            tag::pdu::INFORM_REQUEST => PduType::InformRequest,
            tag::pdu::TRAP_V2 => PduType::TrapV2,
            tag::pdu::REPORT => PduType::Report,
            _ => return None,
        })
    }
}

impl fmt::Display for PduType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PduType::GetRequest => "GetRequest",
            PduType::GetNextRequest => "GetNextRequest",
            PduType::Response => "Response",
            PduType::SetRequest => "SetRequest",
            PduType::TrapV1 => "Trap",
            PduType::GetBulkRequest => "GetBulkRequest",
            PduType::InformRequest => "InformRequest",
            PduType::TrapV2 => "SNMPv2-Trap",
            PduType::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Generic PDU (everything but the SNMPv1 trap).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    /// Error status, or non-repeaters for GETBULK.
    pub error_status: i32,
    /// Error index (1-based), or max-repetitions for GETBULK.
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a request PDU with NULL placeholder values.
    pub fn request(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    /// Create a GETBULK request.
    pub fn get_bulk(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    /// Successful response carrying `varbinds`.
    pub fn response(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Error response echoing this request's bindings.
    ///
    /// `index` is 1-based; 0 means the error is not tied to a binding.
    pub fn error_response(&self, status: ErrorStatus, index: usize) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: status.as_i32(),
            error_index: i32::try_from(index).unwrap_or(0),
            varbinds: self.varbinds.clone(),
        }
    }

    /// Decoded error status.
    pub fn status(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// GETBULK non-repeaters, clamped to the number of bindings.
    pub fn non_repeaters(&self) -> usize {
        usize::try_from(self.error_status)
            .unwrap_or(0)
            .min(self.varbinds.len())
    }

    /// GETBULK max-repetitions.
    pub fn max_repetitions(&self) -> usize {
        usize::try_from(self.error_index).unwrap_or(0)
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode from BER. The next TLV must be a non-trap PDU.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let offset = decoder.offset();
        let tag = decoder
            .peek_tag()
            .ok_or_else(|| Error::decode(offset, DecodeErrorKind::TruncatedData))?;
        let pdu_type = match PduType::from_tag(tag) {
            Some(PduType::TrapV1) | None => {
                return Err(Error::decode(offset, DecodeErrorKind::UnknownPduType(tag)));
            }
            Some(t) => t,
        };

        let mut pdu = decoder.read_constructed(tag)?;
        let request_id = pdu.read_integer()?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;

        if pdu_type == PduType::GetBulkRequest {
            for value in [error_status, error_index] {
                if value < 0 {
                    return Err(Error::decode(
                        offset,
                        DecodeErrorKind::NegativeBulkField { value },
                    ));
                }
            }
        }

        let varbinds = decode_varbind_list(&mut pdu)?;
        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

/// SNMPv1 generic-trap codes (RFC 1157).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericTrap {
    ColdStart = 0,
    WarmStart = 1,
    LinkDown = 2,
    LinkUp = 3,
    AuthenticationFailure = 4,
    EgpNeighborLoss = 5,
    EnterpriseSpecific = 6,
}

impl GenericTrap {
    /// Create from the wire value.
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::ColdStart,
            1 => Self::WarmStart,
            2 => Self::LinkDown,
            3 => Self::LinkUp,
            4 => Self::AuthenticationFailure,
            5 => Self::EgpNeighborLoss,
            6 => Self::EnterpriseSpecific,
            _ => return None,
        })
    }
}

/// SNMPv1 Trap PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapV1Pdu {
    pub enterprise: Oid,
    pub agent_addr: [u8; 4],
    pub generic_trap: GenericTrap,
    pub specific_trap: i32,
    pub time_stamp: u32,
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::TRAP_V1, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_unsigned32(tag::application::TIMETICKS, self.time_stamp);
            buf.push_integer(self.specific_trap);
            buf.push_integer(self.generic_trap as i32);
            buf.push_ip_address(self.agent_addr);
            buf.push_oid(&self.enterprise);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut pdu = decoder.read_constructed(tag::pdu::TRAP_V1)?;
        let enterprise = pdu.read_oid()?;
        let agent_addr = pdu.read_ip_address()?;
        let offset = pdu.offset();
        let generic = pdu.read_integer()?;
        let generic_trap = GenericTrap::from_i32(generic)
            .ok_or_else(|| Error::decode(offset, DecodeErrorKind::IntegerOverflow))?;
        let specific_trap = pdu.read_integer()?;
        let time_stamp = pdu.read_unsigned32(tag::application::TIMETICKS)?;
        let varbinds = decode_varbind_list(&mut pdu)?;
        Ok(Self {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        })
    }
}
