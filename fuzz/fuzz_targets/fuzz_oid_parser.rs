#![no_main]

use libfuzzer_sys::fuzz_target;

use async_snmp_agent::oid::Oid;

fuzz_target!(|data: &[u8]| {
    if let Ok(oid) = Oid::from_ber(data) {
        // Whatever decodes must survive its own encoding
        let _ = Oid::from_ber(&oid.to_ber_smallvec());
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Oid::parse(s);
    }
});
