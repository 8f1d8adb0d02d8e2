//! Request dispatcher.
//!
//! Resolves every variable binding of a decoded PDU against the
//! [`ManagedObjectStore`] under the access decisions of [`VacmConfig`], and
//! builds the response.
//!
//! Per-version behaviour:
//!
//! | Outcome                   | v2c / v3                     | v1                 |
//! |---------------------------|------------------------------|--------------------|
//! | GET, OID not in view      | `noSuchObject` in the binding| `noSuchName`       |
//! | GET, no object / instance | `noSuchObject` / `noSuchInstance` | `noSuchName`  |
//! | other access denials      | `authorizationError`         | `noSuchName`       |
//! | GETNEXT past the end      | `endOfMibView` in the binding| `noSuchName`       |
//! | Counter64 value           | returned                     | invisible          |

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::Serialize;

use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::handler::{GetNextResult, Principal, RequestContext, Response};
use crate::message::{CommunityMessage, MessagePdu};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::community::CommunityTable;
use super::store::{ManagedObjectStore, Snapshot};
use super::vacm::{AccessDenied, VacmConfig, View, ViewType};
use super::walk::Walk;

/// Bytes reserved for the message header and PDU fields when deciding
/// whether a GETBULK response still fits.
const RESPONSE_OVERHEAD: usize = 64;

/// Agent counters, in the spirit of the SNMPv2-MIB `snmp` group.
#[derive(Debug, Default)]
pub struct AgentStats {
    pub(crate) in_packets: AtomicU64,
    pub(crate) in_bad_versions: AtomicU64,
    pub(crate) in_bad_community_names: AtomicU64,
    pub(crate) in_asn_parse_errs: AtomicU64,
    pub(crate) in_get_requests: AtomicU64,
    pub(crate) in_get_nexts: AtomicU64,
    pub(crate) in_get_bulks: AtomicU64,
    pub(crate) in_set_requests: AtomicU64,
    pub(crate) out_responses: AtomicU64,
    pub(crate) out_too_bigs: AtomicU64,
    pub(crate) out_traps: AtomicU64,
    pub(crate) silent_drops: AtomicU64,
}

/// Point-in-time copy of [`AgentStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub in_packets: u64,
    pub in_bad_versions: u64,
    pub in_bad_community_names: u64,
    pub in_asn_parse_errs: u64,
    pub in_get_requests: u64,
    pub in_get_nexts: u64,
    pub in_get_bulks: u64,
    pub in_set_requests: u64,
    pub out_responses: u64,
    pub out_too_bigs: u64,
    pub out_traps: u64,
    pub silent_drops: u64,
}

impl AgentStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            in_packets: load(&self.in_packets),
            in_bad_versions: load(&self.in_bad_versions),
            in_bad_community_names: load(&self.in_bad_community_names),
            in_asn_parse_errs: load(&self.in_asn_parse_errs),
            in_get_requests: load(&self.in_get_requests),
            in_get_nexts: load(&self.in_get_nexts),
            in_get_bulks: load(&self.in_get_bulks),
            in_set_requests: load(&self.in_set_requests),
            out_responses: load(&self.out_responses),
            out_too_bigs: load(&self.out_too_bigs),
            out_traps: load(&self.out_traps),
            silent_drops: load(&self.silent_drops),
        }
    }
}

/// The request dispatcher.
///
/// Cheap to share behind an `Arc`: the community table and VACM are
/// immutable once built and the store has its own interior locking.
#[derive(Debug)]
pub struct Dispatcher {
    pub(super) store: Arc<ManagedObjectStore>,
    pub(super) communities: Arc<CommunityTable>,
    pub(super) vacm: Arc<VacmConfig>,
    pub(super) stats: Arc<AgentStats>,
    /// Held shared by reads and exclusively by a SET from its test phase
    /// until its commit or undo has finished.
    pub(super) set_lock: Arc<tokio::sync::RwLock<()>>,
    max_message_size: usize,
}

impl Dispatcher {
    pub fn new(
        store: Arc<ManagedObjectStore>,
        communities: Arc<CommunityTable>,
        vacm: Arc<VacmConfig>,
    ) -> Self {
        Self {
            store,
            communities,
            vacm,
            stats: Arc::new(AgentStats::default()),
            set_lock: Arc::new(tokio::sync::RwLock::new(())),
            max_message_size: super::DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Largest response the dispatcher will produce.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub(super) fn with_stats(mut self, stats: Arc<AgentStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn store(&self) -> &Arc<ManagedObjectStore> {
        &self.store
    }

    pub fn vacm(&self) -> &VacmConfig {
        &self.vacm
    }

    pub fn communities(&self) -> &CommunityTable {
        &self.communities
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Map a v1/v2c community onto a principal.
    ///
    /// Unknown communities bump the bad-community counter and come back as
    /// [`Error::UnknownSecurityIdentity`].
    pub fn resolve_community(&self, version: Version, community: &[u8]) -> Result<Principal> {
        match self.communities.resolve(community, None) {
            Ok(resolved) => Ok(Principal::community(
                version,
                resolved.security_name,
                resolved.context_name,
            )),
            Err(err) => {
                AgentStats::bump(&self.stats.in_bad_community_names);
                Err(err)
            }
        }
    }

    /// Process one decoded community message.
    ///
    /// Returns the response message, `Ok(None)` when the PDU type gets no
    /// answer (responses, traps, reports, GETBULK under v1), or
    /// [`Error::UnknownSecurityIdentity`] when the community is not mapped.
    pub async fn process(
        &self,
        message: CommunityMessage,
        source: Option<SocketAddr>,
    ) -> Result<Option<CommunityMessage>> {
        let MessagePdu::Pdu(pdu) = message.pdu else {
            tracing::debug!(snmp.source = ?source, "ignoring inbound trap");
            AgentStats::bump(&self.stats.silent_drops);
            return Ok(None);
        };

        let principal = match self.resolve_community(message.version, &message.community) {
            Ok(principal) => principal,
            Err(err) => {
                tracing::debug!(
                    snmp.source = ?source,
                    community = %String::from_utf8_lossy(&message.community),
                    "unknown community"
                );
                return Err(err);
            }
        };

        let mut ctx = RequestContext::new(principal, pdu.request_id, pdu.pdu_type);
        ctx.source = source;

        Ok(self
            .dispatch(&ctx, &pdu)
            .await
            .map(|response| CommunityMessage::new(message.version, message.community, response)))
    }

    /// Decode a datagram, process it and encode the reply.
    ///
    /// SNMPv3 datagrams are dropped here since USM lives outside the agent.
    /// A reply larger than the message size limit becomes `tooBig`.
    pub async fn handle_datagram(
        &self,
        data: Bytes,
        source: Option<SocketAddr>,
    ) -> Result<Option<Bytes>> {
        AgentStats::bump(&self.stats.in_packets);

        match crate::message::peek_version(&data) {
            Ok(version) if !version.is_community() => {
                tracing::debug!(snmp.source = ?source, %version, "dropping non-community message");
                AgentStats::bump(&self.stats.silent_drops);
                return Ok(None);
            }
            Ok(_) => {}
            Err(err) => {
                if matches!(err, Error::Decode { kind: DecodeErrorKind::UnknownVersion(_), .. }) {
                    AgentStats::bump(&self.stats.in_bad_versions);
                } else {
                    AgentStats::bump(&self.stats.in_asn_parse_errs);
                }
                return Err(err);
            }
        }

        let message = CommunityMessage::decode(data).inspect_err(|_| {
            AgentStats::bump(&self.stats.in_asn_parse_errs);
        })?;
        let request = match &message.pdu {
            MessagePdu::Pdu(pdu) => pdu.clone(),
            MessagePdu::TrapV1(_) => return self.process(message, source).await.map(|_| None),
        };

        let Some(reply) = self.process(message, source).await? else {
            return Ok(None);
        };
        let encoded = reply.encode();
        AgentStats::bump(&self.stats.out_responses);
        if encoded.len() <= self.max_message_size {
            return Ok(Some(encoded));
        }

        tracing::debug!(
            snmp.request_id = request.request_id,
            size = encoded.len(),
            limit = self.max_message_size,
            "response too big"
        );
        AgentStats::bump(&self.stats.out_too_bigs);
        let mut too_big = request.error_response(ErrorStatus::TooBig, 0);
        if reply.version != Version::V1 {
            too_big.varbinds.clear();
        }
        Ok(Some(
            CommunityMessage::new(reply.version, reply.community, too_big).encode(),
        ))
    }

    /// Dispatch one PDU for an already-resolved principal.
    ///
    /// v3 requests enter here directly, with the principal supplied by the
    /// external security engine.
    pub async fn dispatch(&self, ctx: &RequestContext, pdu: &Pdu) -> Option<Pdu> {
        tracing::debug!(
            snmp.request_id = pdu.request_id,
            snmp.pdu_type = %pdu.pdu_type,
            security_name = %String::from_utf8_lossy(&ctx.principal.security_name),
            varbinds = pdu.varbinds.len(),
            "dispatching request"
        );

        let response = match pdu.pdu_type {
            PduType::GetRequest => {
                AgentStats::bump(&self.stats.in_get_requests);
                let _reading = self.set_lock.read().await;
                self.handle_get(ctx, pdu).await
            }
            PduType::GetNextRequest => {
                AgentStats::bump(&self.stats.in_get_nexts);
                let _reading = self.set_lock.read().await;
                self.handle_get_next(ctx, pdu).await
            }
            PduType::GetBulkRequest if ctx.version() != Version::V1 => {
                AgentStats::bump(&self.stats.in_get_bulks);
                let _reading = self.set_lock.read().await;
                self.handle_get_bulk(ctx, pdu).await
            }
            PduType::SetRequest => {
                AgentStats::bump(&self.stats.in_set_requests);
                self.handle_set(ctx, pdu).await
            }
            other => {
                tracing::debug!(snmp.pdu_type = %other, "no response for PDU type");
                AgentStats::bump(&self.stats.silent_drops);
                return None;
            }
        };

        if response.is_error() {
            tracing::debug!(
                snmp.request_id = pdu.request_id,
                error_status = %response.error_status,
                error_index = response.error_index,
                "request failed"
            );
        }
        Some(response.into_pdu(pdu.request_id))
    }

    /// Access decision for one OID.
    pub(super) fn check(
        &self,
        principal: &Principal,
        oid: &Oid,
        view_type: ViewType,
    ) -> std::result::Result<Bytes, AccessDenied> {
        self.vacm.check(
            &principal.security_name,
            principal.security_model,
            principal.security_level,
            &principal.context_name,
            oid,
            view_type,
        )
    }

    fn read_view(&self, principal: &Principal) -> std::result::Result<&View, AccessDenied> {
        self.vacm
            .resolve_view(
                &principal.security_name,
                principal.security_model,
                principal.security_level,
                &principal.context_name,
                ViewType::Read,
            )
            .map(|(_, view)| view)
    }

    /// Error response carrying the request's bindings, down-mapped for v1.
    pub(super) fn failure(ctx: &RequestContext, pdu: &Pdu, status: ErrorStatus, index: usize) -> Response {
        let status = if ctx.version() == Version::V1 {
            status.to_v1()
        } else {
            status
        };
        Response::error(status, index, pdu.varbinds.clone())
    }

    async fn handle_get(&self, ctx: &RequestContext, pdu: &Pdu) -> Response {
        let snapshot = self.store.snapshot();
        let principal = &ctx.principal;
        let v1 = ctx.version() == Version::V1;
        let mut varbinds = Vec::with_capacity(pdu.varbinds.len());

        for (index, vb) in pdu.varbinds.iter().enumerate() {
            let value = match self.check(principal, &vb.oid, ViewType::Read) {
                Ok(_) => match snapshot.lookup(&principal.context_name, &vb.oid) {
                    Some(object) => object.get(ctx, &vb.oid).await.into_wire_value(),
                    None => Value::NoSuchObject,
                },
                Err(AccessDenied::NotInView) => Value::NoSuchObject,
                Err(denied) => {
                    tracing::debug!(snmp.oid = %vb.oid, %denied, "read denied");
                    return Self::failure(ctx, pdu, ErrorStatus::AuthorizationError, index + 1);
                }
            };

            if v1 && (value.is_exception() || matches!(value, Value::Counter64(_))) {
                return Self::failure(ctx, pdu, ErrorStatus::NoSuchName, index + 1);
            }
            varbinds.push(VarBind::new(vb.oid.clone(), value));
        }

        Response::success(varbinds)
    }

    async fn handle_get_next(&self, ctx: &RequestContext, pdu: &Pdu) -> Response {
        let snapshot = self.store.snapshot();
        let view = match self.read_view(&ctx.principal) {
            Ok(view) => view,
            Err(denied) => {
                tracing::debug!(%denied, "read denied");
                return Self::failure(ctx, pdu, ErrorStatus::AuthorizationError, 1);
            }
        };

        let mut varbinds = Vec::with_capacity(pdu.varbinds.len());
        for (index, vb) in pdu.varbinds.iter().enumerate() {
            match next_visible(&snapshot, ctx, view, &vb.oid).await {
                Some(next) => varbinds.push(next),
                None if ctx.version() == Version::V1 => {
                    return Self::failure(ctx, pdu, ErrorStatus::NoSuchName, index + 1);
                }
                None => varbinds.push(VarBind::new(vb.oid.clone(), Value::EndOfMibView)),
            }
        }

        Response::success(varbinds)
    }

    /// GETBULK (RFC 3416 Section 4.2.3).
    ///
    /// Repetitions stop early once every repeater has hit the end of the
    /// view, or when another row would not fit in the response.
    async fn handle_get_bulk(&self, ctx: &RequestContext, pdu: &Pdu) -> Response {
        let snapshot = self.store.snapshot();
        let view = match self.read_view(&ctx.principal) {
            Ok(view) => view,
            Err(denied) => {
                tracing::debug!(%denied, "read denied");
                return Self::failure(ctx, pdu, ErrorStatus::AuthorizationError, 1);
            }
        };

        let non_repeaters = pdu.non_repeaters().min(pdu.varbinds.len());
        let budget = self.max_message_size.saturating_sub(RESPONSE_OVERHEAD);
        let mut used = 0usize;
        let mut varbinds = Vec::new();

        for vb in &pdu.varbinds[..non_repeaters] {
            let next = next_visible(&snapshot, ctx, view, &vb.oid)
                .await
                .unwrap_or_else(|| VarBind::new(vb.oid.clone(), Value::EndOfMibView));
            used += next.encoded_size();
            varbinds.push(next);
        }

        let mut cursors: Vec<Oid> = pdu.varbinds[non_repeaters..]
            .iter()
            .map(|vb| vb.oid.clone())
            .collect();
        if cursors.is_empty() {
            return Response::success(varbinds);
        }

        'rows: for _ in 0..pdu.max_repetitions() {
            let mut row = Vec::with_capacity(cursors.len());
            let mut all_ended = true;
            for cursor in &mut cursors {
                let next = match next_visible(&snapshot, ctx, view, cursor).await {
                    Some(next) => {
                        all_ended = false;
                        *cursor = next.oid.clone();
                        next
                    }
                    None => VarBind::new(cursor.clone(), Value::EndOfMibView),
                };
                row.push(next);
            }

            let row_size: usize = row.iter().map(VarBind::encoded_size).sum();
            if used + row_size > budget {
                break 'rows;
            }
            used += row_size;
            varbinds.extend(row);
            if all_ended {
                break;
            }
        }

        Response::success(varbinds)
    }

    /// Stream every visible binding under `root` for `principal`.
    pub fn walk(self: &Arc<Self>, principal: Principal, root: Oid) -> Walk {
        Walk::new(Arc::clone(self), principal, root)
    }

    /// Next binding after `oid` the principal may read, or `None` once the
    /// view can hold nothing further under `root`.
    pub(super) async fn next_for(
        &self,
        ctx: &RequestContext,
        root: &Oid,
        oid: &Oid,
    ) -> std::result::Result<Option<VarBind>, AccessDenied> {
        let view = self.read_view(&ctx.principal)?;
        if !view.may_contain_under(root) {
            return Ok(None);
        }
        let _reading = self.set_lock.read().await;
        let snapshot = self.store.snapshot();
        Ok(next_visible(&snapshot, ctx, view, oid).await)
    }
}

/// Walk forward from `oid` until an instance the view admits.
///
/// Instances outside the view are skipped, never returned, so a walk cannot
/// reveal their existence. Counter64 values are skipped for v1.
async fn next_visible(
    snapshot: &Snapshot,
    ctx: &RequestContext,
    view: &View,
    oid: &Oid,
) -> Option<VarBind> {
    let context = &ctx.principal.context_name;
    let v1 = ctx.version() == Version::V1;
    let mut cursor = oid.clone();

    loop {
        let GetNextResult::Value(vb) = snapshot.lookup_next(ctx, context, &cursor).await else {
            return None;
        };
        if view.contains(&vb.oid) && !(v1 && matches!(vb.value, Value::Counter64(_))) {
            return Some(vb);
        }
        tracing::trace!(snmp.oid = %vb.oid, "skipping invisible instance");
        cursor = vb.oid;
    }
}

/// Error for a community message that resolved to no principal.
pub(crate) fn is_unknown_identity(err: &Error) -> bool {
    matches!(err, Error::UnknownSecurityIdentity { .. })
}
