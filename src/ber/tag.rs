//! Identifier octets used by the v1/v2c agent (X.690 Section 8.1.2).
//!
//! Every tag the agent reads or writes fits the low-tag-number form, so a
//! tag is one octet: class in bits 7-6, constructed flag in bit 5, number in
//! bits 4-0.

const APPLICATION: u8 = 0x40;
const CONTEXT: u8 = 0x80;
const CONSTRUCTED: u8 = 0x20;

const fn app(number: u8) -> u8 {
    APPLICATION | number
}

const fn ctx(number: u8) -> u8 {
    CONTEXT | number
}

const fn pdu_tag(number: u8) -> u8 {
    CONTEXT | CONSTRUCTED | number
}

/// ASN.1 universal types.
pub mod universal {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    /// Constructed OCTET STRING, refused by the decoder.
    pub const OCTET_STRING_CONSTRUCTED: u8 = OCTET_STRING | super::CONSTRUCTED;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x10 | super::CONSTRUCTED;
}

/// SMI application types (RFC 2578 Section 7.1).
pub mod application {
    use super::app;

    pub const IP_ADDRESS: u8 = app(0);
    pub const COUNTER32: u8 = app(1);
    /// Gauge32 and Unsigned32 share a tag.
    pub const GAUGE32: u8 = app(2);
    pub const TIMETICKS: u8 = app(3);
    pub const OPAQUE: u8 = app(4);
    pub const COUNTER64: u8 = app(6);
}

/// SNMPv2 exception values, sent in place of a value (RFC 3416).
pub mod context {
    use super::ctx;

    pub const NO_SUCH_OBJECT: u8 = ctx(0);
    pub const NO_SUCH_INSTANCE: u8 = ctx(1);
    pub const END_OF_MIB_VIEW: u8 = ctx(2);
}

/// PDU choices.
pub mod pdu {
    use super::pdu_tag;

    pub const GET_REQUEST: u8 = pdu_tag(0);
    pub const GET_NEXT_REQUEST: u8 = pdu_tag(1);
    pub const RESPONSE: u8 = pdu_tag(2);
    pub const SET_REQUEST: u8 = pdu_tag(3);
    /// SNMPv1 Trap-PDU, only ever sent by this agent.
    pub const TRAP_V1: u8 = pdu_tag(4);
    pub const GET_BULK_REQUEST: u8 = pdu_tag(5);
    pub const INFORM_REQUEST: u8 = pdu_tag(6);
    pub const TRAP_V2: u8 = pdu_tag(7);
    pub const REPORT: u8 = pdu_tag(8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(universal::SEQUENCE, 0x30);
        assert_eq!(universal::OCTET_STRING_CONSTRUCTED, 0x24);
        assert_eq!(application::IP_ADDRESS, 0x40);
        assert_eq!(application::COUNTER64, 0x46);
        assert_eq!(context::END_OF_MIB_VIEW, 0x82);
        assert_eq!(pdu::GET_REQUEST, 0xA0);
        assert_eq!(pdu::TRAP_V1, 0xA4);
        assert_eq!(pdu::TRAP_V2, 0xA7);
    }
}
