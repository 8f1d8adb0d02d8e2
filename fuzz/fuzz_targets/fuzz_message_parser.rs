#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use async_snmp_agent::ber::Decoder;
use async_snmp_agent::message::{CommunityMessage, peek_version};
use async_snmp_agent::pdu::{Pdu, TrapV1Pdu};

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    let _ = peek_version(&bytes);

    // A successful decode must re-encode without panicking
    if let Ok(message) = CommunityMessage::decode(bytes.clone()) {
        let _ = message.encode();
    }

    let mut decoder = Decoder::new(bytes.clone());
    let _ = Pdu::decode(&mut decoder);

    let mut decoder = Decoder::new(bytes);
    let _ = TrapV1Pdu::decode(&mut decoder);
});
