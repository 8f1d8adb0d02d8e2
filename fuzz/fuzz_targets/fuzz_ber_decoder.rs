#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use async_snmp_agent::ber::Decoder;
use async_snmp_agent::value::Value;
use async_snmp_agent::varbind::{VarBind, decode_varbind_list};

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_integer();

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_counter64();

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_oid();

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_ip_address();

    // Every SMI syntax plus the v2 exceptions
    let mut decoder = Decoder::new(bytes.clone());
    let _ = Value::decode(&mut decoder);

    let mut decoder = Decoder::new(bytes.clone());
    let _ = VarBind::decode(&mut decoder);

    let mut decoder = Decoder::new(bytes);
    let _ = decode_varbind_list(&mut decoder);
});
