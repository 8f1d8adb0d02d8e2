//! Agent fixtures built from the bootstrap configuration.

use std::sync::Arc;

use async_snmp_agent::agent::{
    Dispatcher, ManagedObjectStore, VacmBuilder, VacmConfig, bootstrap,
};
use async_snmp_agent::handler::{Principal, RequestContext};
use async_snmp_agent::message::{CommunityMessage, MessagePdu};
use async_snmp_agent::pdu::{Pdu, PduType};
use async_snmp_agent::{Oid, Version, oid};

pub const COMMUNITY: &str = "private";
pub const UNMAPPED_COMMUNITY: &str = "public";

/// Software version scalar, value "1".
pub fn version_oid() -> Oid {
    bootstrap::version_oid()
}

/// Watermark scalar, value "120".
pub fn watermark_oid() -> Oid {
    bootstrap::watermark_oid()
}

/// sysDescr.0, registered by some tests but never in `systemview`.
pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

pub fn vendor_root() -> Oid {
    Oid::from_slice(bootstrap::VENDOR_ROOT)
}

/// Store with the bootstrap scalars registered.
pub fn bootstrap_store() -> Arc<ManagedObjectStore> {
    let store = Arc::new(ManagedObjectStore::new());
    bootstrap::register_managed_objects(&store).expect("bootstrap registration");
    store
}

pub fn dispatcher_with(store: Arc<ManagedObjectStore>, vacm: VacmConfig) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        store,
        Arc::new(bootstrap::community_table()),
        Arc::new(vacm),
    ))
}

/// Dispatcher over the full bootstrap configuration.
pub fn bootstrap_dispatcher() -> Arc<Dispatcher> {
    dispatcher_with(bootstrap_store(), bootstrap::vacm())
}

/// Bootstrap VACM plus a v2c entry that may write the vendor subtree.
pub fn writable_vacm() -> VacmConfig {
    VacmBuilder::from_config(bootstrap::vacm())
        .view("writeview", |v| v.include(vendor_root()))
        .access(bootstrap::GROUP_NAME, |a| {
            a.security_model(async_snmp_agent::agent::SecurityModel::V2c)
                .read_view(bootstrap::READ_VIEW)
                .write_view("writeview")
        })
        .build()
}

pub fn principal(version: Version) -> Principal {
    Principal::community(version, bootstrap::SECURITY_NAME, "")
}

pub fn context(version: Version, pdu: &Pdu) -> RequestContext {
    RequestContext::new(principal(version), pdu.request_id, pdu.pdu_type)
}

pub fn get(request_id: i32, oids: &[Oid]) -> Pdu {
    Pdu::request(PduType::GetRequest, request_id, oids)
}

pub fn get_next(request_id: i32, oids: &[Oid]) -> Pdu {
    Pdu::request(PduType::GetNextRequest, request_id, oids)
}

pub fn message(version: Version, community: &str, pdu: Pdu) -> CommunityMessage {
    CommunityMessage::new(version, community.as_bytes().to_vec(), pdu)
}

/// The PDU inside a reply, panicking on traps.
pub fn response_pdu(message: CommunityMessage) -> Pdu {
    match message.pdu {
        MessagePdu::Pdu(pdu) => pdu,
        MessagePdu::TrapV1(_) => panic!("expected a response PDU"),
    }
}
