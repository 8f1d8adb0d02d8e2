#![no_main]

use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use async_snmp_agent::agent::{Dispatcher, ManagedObjectStore, bootstrap};

static RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
});

static DISPATCHER: LazyLock<Dispatcher> = LazyLock::new(|| {
    let store = Arc::new(ManagedObjectStore::new());
    bootstrap::register_managed_objects(&store).expect("bootstrap objects");
    Dispatcher::new(
        store,
        Arc::new(bootstrap::community_table()),
        Arc::new(bootstrap::vacm()),
    )
});

// Arbitrary datagrams through the full request path
fuzz_target!(|data: &[u8]| {
    let datagram = Bytes::copy_from_slice(data);
    let _ = RUNTIME.block_on(DISPATCHER.handle_datagram(datagram, None));
});
