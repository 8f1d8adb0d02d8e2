//! Notification originator.
//!
//! Builds SNMPv2-Trap PDUs (or SNMPv1 Trap PDUs, translated per RFC 3584
//! Section 3.2) and hands them to a [`NotificationSink`]. Delivery is best
//! effort: failures are logged and counted, never retried.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::message::{CommunityMessage, SecurityLevel};
use crate::oid::Oid;
use crate::pdu::{GenericTrap, Pdu, PduType, TrapV1Pdu};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::dispatch::AgentStats;
use super::vacm::{VacmConfig, ViewType};

/// sysUpTime.0
pub const SYS_UPTIME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 3, 0];
/// snmpTrapOID.0
pub const SNMP_TRAP_OID: &[u32] = &[1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0];
/// snmpTrapEnterprise.0
pub const SNMP_TRAP_ENTERPRISE: &[u32] = &[1, 3, 6, 1, 6, 3, 1, 1, 4, 3, 0];
/// snmpTraps, parent of the generic notifications.
pub const SNMP_TRAPS: &[u32] = &[1, 3, 6, 1, 6, 3, 1, 1, 5];

/// coldStart notification OID.
pub fn cold_start() -> Oid {
    Oid::from_slice(SNMP_TRAPS).child(1)
}

/// authenticationFailure notification OID.
pub fn authentication_failure() -> Oid {
    Oid::from_slice(SNMP_TRAPS).child(5)
}

/// Where a notification goes and under which identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub address: SocketAddr,
    pub version: Version,
    /// Community put on the wire (v1/v2c).
    #[serde(with = "crate::util::serde_text")]
    pub community: Bytes,
    /// Security name the notify view is checked under.
    #[serde(with = "crate::util::serde_text")]
    pub security_name: Bytes,
    pub security_level: SecurityLevel,
}

impl NotificationTarget {
    /// A v1 or v2c target.
    pub fn community(
        address: SocketAddr,
        version: Version,
        community: impl Into<Bytes>,
        security_name: impl Into<Bytes>,
    ) -> Self {
        Self {
            address,
            version,
            community: community.into(),
            security_name: security_name.into(),
            security_level: SecurityLevel::NoAuthNoPriv,
        }
    }

    /// An SNMPv3 target. The sink is responsible for USM.
    pub fn usm(address: SocketAddr, security_name: impl Into<Bytes>, level: SecurityLevel) -> Self {
        Self {
            address,
            version: Version::V3,
            community: Bytes::new(),
            security_name: security_name.into(),
            security_level: level,
        }
    }
}

/// A notification PDU ready for a particular target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPdu {
    TrapV1(TrapV1Pdu),
    TrapV2(Pdu),
}

/// Transport collaborator for notifications.
pub trait NotificationSink: Send + Sync + 'static {
    fn send<'a>(
        &'a self,
        target: &'a NotificationTarget,
        pdu: OutboundPdu,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Sends v1/v2c notifications over UDP from an ephemeral port.
///
/// v3 targets are skipped since USM is not part of the agent.
#[derive(Debug, Default)]
pub struct UdpNotificationSink;

impl NotificationSink for UdpNotificationSink {
    fn send<'a>(
        &'a self,
        target: &'a NotificationTarget,
        pdu: OutboundPdu,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let message = match (target.version, pdu) {
                (Version::V1, OutboundPdu::TrapV1(trap)) => {
                    CommunityMessage::trap_v1(target.community.clone(), trap)
                }
                (Version::V2c, OutboundPdu::TrapV2(pdu)) => {
                    CommunityMessage::new(Version::V2c, target.community.clone(), pdu)
                }
                (version, _) => {
                    tracing::debug!(snmp.target = %target.address, %version, "no transport for target version, skipping");
                    return Ok(());
                }
            };

            let io = |source| Error::Io {
                target: Some(target.address),
                source,
            };
            let socket = crate::util::bind_udp_socket(crate::util::unspecified_for(&target.address), None)
                .await
                .map_err(io)?;
            socket
                .send_to(&message.encode(), target.address)
                .await
                .map_err(io)?;
            Ok(())
        })
    }
}

/// Forwards notifications into a channel. Useful for embedding and tests.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(NotificationTarget, OutboundPdu)>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<(NotificationTarget, OutboundPdu)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn send<'a>(
        &'a self,
        target: &'a NotificationTarget,
        pdu: OutboundPdu,
    ) -> BoxFuture<'a, Result<()>> {
        let sent = self
            .tx
            .send((target.clone(), pdu))
            .map_err(|_| Error::Config("notification channel closed".into()));
        Box::pin(async move { sent })
    }
}

/// Builds and emits notifications to the configured targets.
pub struct NotificationOriginator {
    targets: Vec<NotificationTarget>,
    sink: Arc<dyn NotificationSink>,
    vacm: Arc<VacmConfig>,
    stats: Arc<AgentStats>,
    started: Instant,
    agent_addr: [u8; 4],
    next_request_id: AtomicI32,
}

impl std::fmt::Debug for NotificationOriginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationOriginator")
            .field("targets", &self.targets)
            .field("agent_addr", &self.agent_addr)
            .finish_non_exhaustive()
    }
}

impl NotificationOriginator {
    pub fn new(
        targets: Vec<NotificationTarget>,
        sink: Arc<dyn NotificationSink>,
        vacm: Arc<VacmConfig>,
        started: Instant,
    ) -> Self {
        Self {
            targets,
            sink,
            vacm,
            stats: Arc::new(AgentStats::default()),
            started,
            agent_addr: [0; 4],
            next_request_id: AtomicI32::new(1),
        }
    }

    /// Address put in the agent-addr field of v1 traps.
    pub fn with_agent_addr(mut self, addr: [u8; 4]) -> Self {
        self.agent_addr = addr;
        self
    }

    pub(super) fn with_stats(mut self, stats: Arc<AgentStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn targets(&self) -> &[NotificationTarget] {
        &self.targets
    }

    /// sysUpTime in hundredths of a second since the agent started.
    pub fn uptime(&self) -> u32 {
        // TimeTicks wrap at 2^32
        (self.started.elapsed().as_millis() / 10) as u32
    }

    /// Send `trap_oid` with `varbinds` to every target whose notify view
    /// admits it. Returns how many targets it was handed to.
    pub async fn notify(&self, trap_oid: &Oid, varbinds: &[VarBind]) -> usize {
        let uptime = self.uptime();
        let mut delivered = 0;

        for target in &self.targets {
            if !self.permitted(target, trap_oid, varbinds) {
                tracing::debug!(snmp.target = %target.address, snmp.oid = %trap_oid, "notification outside notify view");
                continue;
            }

            let pdu = match target.version {
                Version::V1 => OutboundPdu::TrapV1(self.to_v1(trap_oid, varbinds, uptime)),
                _ => OutboundPdu::TrapV2(self.to_v2(trap_oid, varbinds, uptime)),
            };

            match self.sink.send(target, pdu).await {
                Ok(()) => {
                    AgentStats::bump(&self.stats.out_traps);
                    delivered += 1;
                }
                Err(err) => {
                    tracing::warn!(snmp.target = %target.address, error = %err, "failed to send notification");
                }
            }
        }

        tracing::info!(snmp.oid = %trap_oid, delivered, "notification sent");
        delivered
    }

    fn permitted(&self, target: &NotificationTarget, trap_oid: &Oid, varbinds: &[VarBind]) -> bool {
        let check = |oid: &Oid| {
            self.vacm
                .check(
                    &target.security_name,
                    target.version.security_model(),
                    target.security_level,
                    b"",
                    oid,
                    ViewType::Notify,
                )
                .is_ok()
        };
        check(trap_oid) && varbinds.iter().all(|vb| check(&vb.oid))
    }

    fn to_v2(&self, trap_oid: &Oid, varbinds: &[VarBind], uptime: u32) -> Pdu {
        let mut all = Vec::with_capacity(varbinds.len() + 2);
        all.push(VarBind::new(Oid::from_slice(SYS_UPTIME), Value::TimeTicks(uptime)));
        all.push(VarBind::new(
            Oid::from_slice(SNMP_TRAP_OID),
            Value::ObjectIdentifier(trap_oid.clone()),
        ));
        all.extend_from_slice(varbinds);

        Pdu {
            pdu_type: PduType::TrapV2,
            request_id: self.next_request_id.fetch_add(1, Ordering::Relaxed),
            error_status: 0,
            error_index: 0,
            varbinds: all,
        }
    }

    /// RFC 3584 Section 3.2 translation.
    fn to_v1(&self, trap_oid: &Oid, varbinds: &[VarBind], uptime: u32) -> TrapV1Pdu {
        let traps = Oid::from_slice(SNMP_TRAPS);
        let enterprise_binding = Oid::from_slice(SNMP_TRAP_ENTERPRISE);

        let generic = match trap_oid.strip_prefix(&traps) {
            Some([arc]) => i32::try_from(*arc)
                .ok()
                .and_then(|arc| arc.checked_sub(1))
                .and_then(GenericTrap::from_i32)
                .filter(|g| *g != GenericTrap::EnterpriseSpecific),
            _ => None,
        };

        let (enterprise, generic_trap, specific_trap) = match generic {
            Some(generic) => {
                let enterprise = varbinds
                    .iter()
                    .find(|vb| vb.oid == enterprise_binding)
                    .and_then(|vb| match &vb.value {
                        Value::ObjectIdentifier(oid) => Some(oid.clone()),
                        _ => None,
                    })
                    .unwrap_or(traps);
                (enterprise, generic, 0)
            }
            None => {
                let arcs = trap_oid.arcs();
                let (specific, rest) = arcs.split_last().map_or((0, arcs), |(last, rest)| (*last, rest));
                let rest = match rest.split_last() {
                    Some((0, parent)) => parent,
                    _ => rest,
                };
                (
                    Oid::from_slice(rest),
                    GenericTrap::EnterpriseSpecific,
                    i32::try_from(specific).unwrap_or(i32::MAX),
                )
            }
        };

        TrapV1Pdu {
            enterprise,
            agent_addr: self.agent_addr,
            generic_trap,
            specific_trap,
            time_stamp: uptime,
            varbinds: varbinds
                .iter()
                .filter(|vb| vb.oid != enterprise_binding && !matches!(vb.value, Value::Counter64(_)))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::vacm::{SecurityModel, VacmBuilder};
    use crate::oid;

    fn vacm() -> Arc<VacmConfig> {
        Arc::new(
            VacmBuilder::new()
                .group("monitor", SecurityModel::V2c, "monitors")
                .group("monitor", SecurityModel::V1, "monitors")
                .group("quiet", SecurityModel::V2c, "quiet")
                .access("monitors", |a| a.notify_view("traps"))
                .access("quiet", |a| a.notify_view("vendorOnly"))
                .view("traps", |v| v.include(oid!(1, 3, 6, 1)))
                .view("vendorOnly", |v| v.include(oid!(1, 3, 6, 1, 4, 1, 21703)))
                .build(),
        )
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:162".parse().unwrap()
    }

    fn originator(targets: Vec<NotificationTarget>) -> (NotificationOriginator, mpsc::UnboundedReceiver<(NotificationTarget, OutboundPdu)>) {
        let (sink, rx) = ChannelSink::channel();
        let originator = NotificationOriginator::new(targets, Arc::new(sink), vacm(), Instant::now())
            .with_agent_addr([192, 0, 2, 1]);
        (originator, rx)
    }

    #[tokio::test]
    async fn test_cold_start_v2c_layout() {
        let (originator, mut rx) =
            originator(vec![NotificationTarget::community(addr(), Version::V2c, "private", "monitor")]);
        assert_eq!(originator.notify(&cold_start(), &[]).await, 1);

        let (target, pdu) = rx.recv().await.unwrap();
        assert_eq!(target.community.as_ref(), b"private");
        let OutboundPdu::TrapV2(pdu) = pdu else {
            panic!("expected an SNMPv2-Trap");
        };
        assert_eq!(pdu.pdu_type, PduType::TrapV2);
        assert_eq!(pdu.varbinds[0].oid, Oid::from_slice(SYS_UPTIME));
        assert!(matches!(pdu.varbinds[0].value, Value::TimeTicks(_)));
        assert_eq!(pdu.varbinds[1].value, Value::ObjectIdentifier(cold_start()));
    }

    #[tokio::test]
    async fn test_generic_trap_translated_for_v1() {
        let (originator, mut rx) =
            originator(vec![NotificationTarget::community(addr(), Version::V1, "private", "monitor")]);
        originator.notify(&authentication_failure(), &[]).await;

        let (_, OutboundPdu::TrapV1(trap)) = rx.recv().await.unwrap() else {
            panic!("expected a v1 trap");
        };
        assert_eq!(trap.generic_trap, GenericTrap::AuthenticationFailure);
        assert_eq!(trap.specific_trap, 0);
        assert_eq!(trap.enterprise, Oid::from_slice(SNMP_TRAPS));
        assert_eq!(trap.agent_addr, [192, 0, 2, 1]);
    }

    #[tokio::test]
    async fn test_enterprise_trap_translated_for_v1() {
        let (originator, mut rx) =
            originator(vec![NotificationTarget::community(addr(), Version::V1, "private", "monitor")]);
        let bindings = [
            VarBind::new(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0), Value::from("1")),
            VarBind::new(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 4, 0), Value::Counter64(1)),
        ];
        originator
            .notify(&oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 0, 3), &bindings)
            .await;

        let (_, OutboundPdu::TrapV1(trap)) = rx.recv().await.unwrap() else {
            panic!("expected a v1 trap");
        };
        assert_eq!(trap.generic_trap, GenericTrap::EnterpriseSpecific);
        assert_eq!(trap.specific_trap, 3);
        assert_eq!(trap.enterprise, oid!(1, 3, 6, 1, 4, 1, 21703, 7500));
        // Counter64 cannot be expressed in a v1 trap
        assert_eq!(trap.varbinds.len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_generic_arc_is_enterprise_specific() {
        let (originator, mut rx) =
            originator(vec![NotificationTarget::community(addr(), Version::V1, "private", "monitor")]);
        let huge = Oid::from_slice(SNMP_TRAPS).child(2_147_483_648);
        originator.notify(&huge, &[]).await;

        let (_, OutboundPdu::TrapV1(trap)) = rx.recv().await.unwrap() else {
            panic!("expected a v1 trap");
        };
        assert_eq!(trap.generic_trap, GenericTrap::EnterpriseSpecific);
        assert_eq!(trap.enterprise, Oid::from_slice(SNMP_TRAPS));
        assert_eq!(trap.specific_trap, i32::MAX);
    }

    #[tokio::test]
    async fn test_notify_view_filters_targets() {
        let (originator, mut rx) = originator(vec![
            NotificationTarget::community(addr(), Version::V2c, "private", "quiet"),
            NotificationTarget::community(addr(), Version::V2c, "private", "unknown"),
            NotificationTarget::community(addr(), Version::V2c, "private", "monitor"),
        ]);
        assert_eq!(originator.notify(&cold_start(), &[]).await, 1);
        let (target, _) = rx.recv().await.unwrap();
        assert_eq!(target.security_name.as_ref(), b"monitor");

        let vendor = oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 0, 1);
        assert_eq!(originator.notify(&vendor, &[]).await, 2);
    }

    #[tokio::test]
    async fn test_udp_sink_skips_v3() {
        let target = NotificationTarget::usm(addr(), "admin", SecurityLevel::AuthPriv);
        let pdu = OutboundPdu::TrapV2(Pdu::response(1, Vec::new()));
        assert!(UdpNotificationSink.send(&target, pdu).await.is_ok());
    }

    #[tokio::test]
    async fn test_udp_sink_delivers_v2c() {
        let receiver = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = NotificationTarget::community(
            receiver.local_addr().unwrap(),
            Version::V2c,
            "private",
            "monitor",
        );
        let (originator, _rx) = originator(Vec::new());
        let pdu = OutboundPdu::TrapV2(originator.to_v2(&cold_start(), &[], 42));
        UdpNotificationSink.send(&target, pdu).await.unwrap();

        let mut buf = [0u8; 1500];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        let message = CommunityMessage::decode(Bytes::copy_from_slice(&buf[..len])).unwrap();
        assert_eq!(message.version, Version::V2c);
        assert_eq!(message.community.as_ref(), b"private");
    }
}
