//! SNMP agent core.
//!
//! - [`ManagedObjectStore`] - OID-ordered registry of managed objects
//! - [`CommunityTable`] - community to security name mapping
//! - [`VacmConfig`] - view-based access control (RFC 3415)
//! - [`Dispatcher`] - GET, GETNEXT, GETBULK and SET over the three above
//! - [`NotificationOriginator`] - coldStart and friends
//! - [`Agent`] - all of the above behind a UDP listener
//!
//! # Example
//!
//! ```rust,no_run
//! use async_snmp_agent::agent::Agent;
//!
//! # async fn example() -> async_snmp_agent::Result<()> {
//! let agent = Agent::builder()
//!     .bind("0.0.0.0:1161")
//!     .bootstrap()
//!     .build()
//!     .await?;
//!
//! agent.start().await?;
//! tokio::signal::ctrl_c().await.ok();
//! agent.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
mod community;
mod dispatch;
mod notification;
mod set_handler;
mod state;
mod store;
pub(crate) mod vacm;
mod walk;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, RegistrationError, Result};
use crate::handler::ManagedObject;
use crate::oid::Oid;
use crate::util::{bind_udp_socket, to_hex};
use crate::varbind::VarBind;

pub use community::{CommunityEntry, CommunityTable, Resolved, StorageType};
pub use dispatch::{AgentStats, Dispatcher, StatsSnapshot};
pub use notification::{
    ChannelSink, NotificationOriginator, NotificationSink, NotificationTarget, OutboundPdu,
    SNMP_TRAP_ENTERPRISE, SNMP_TRAP_OID, SNMP_TRAPS, SYS_UPTIME, UdpNotificationSink,
    authentication_failure, cold_start,
};
pub use state::{
    BootRecord, ConfigSnapshot, FileStateStore, MAX_ENGINE_BOOTS, MemoryStateStore, StateStore,
};
pub use store::{ManagedObjectStore, Snapshot};
pub use vacm::{
    AccessDenied, AccessEntryBuilder, ContextMatch, GroupEntry, NamedView, SecurityModel,
    VacmAccessEntry, VacmBuilder, VacmConfig, VacmSnapshot, View, ViewSubtree, ViewType,
};
pub use walk::Walk;

/// Largest payload of a single IPv4 UDP datagram.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65507;

/// Smallest message size every SNMP entity must accept (RFC 3417).
pub const MIN_MESSAGE_SIZE: usize = 484;

pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 64;

/// Receive buffer, large enough for any UDP datagram.
const RECV_BUFFER_SIZE: usize = 65535;

/// Kernel receive buffer requested for the listening socket.
const SOCKET_RECV_BUFFER: usize = 1 << 20;

/// Enterprise number carried in the default engine ID.
const ENTERPRISE: u32 = 21703;

/// RFC 3411 text-format engine ID under [`ENTERPRISE`].
fn text_engine_id(text: &str) -> Bytes {
    let mut id = Vec::with_capacity(5 + text.len());
    id.extend_from_slice(&(0x8000_0000 | ENTERPRISE).to_be_bytes());
    id.push(4);
    id.extend_from_slice(text.as_bytes());
    Bytes::from(id)
}

/// Static agent settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub bind_addr: String,
    pub engine_id: Bytes,
    pub max_message_size: usize,
    pub max_concurrent_requests: usize,
    /// Send authenticationFailure when a request carries an unknown community.
    pub authentication_failure_traps: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:161".into(),
            engine_id: text_engine_id("async-snmp-agent"),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            authentication_failure_traps: false,
        }
    }
}

impl AgentConfig {
    fn validate(&self) -> Result<()> {
        if self.engine_id.len() < 5 || self.engine_id.len() > 32 {
            return Err(Error::Config(format!(
                "engine ID must be 5 to 32 octets, got {}",
                self.engine_id.len()
            )));
        }
        if self.max_message_size < MIN_MESSAGE_SIZE {
            return Err(Error::Config(format!(
                "max message size {} is below the minimum of {MIN_MESSAGE_SIZE}",
                self.max_message_size
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(Error::Config("max concurrent requests must be at least 1".into()));
        }
        Ok(())
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    config: AgentConfig,
    communities: CommunityTable,
    vacm: VacmBuilder,
    targets: Vec<NotificationTarget>,
    sink: Option<Arc<dyn NotificationSink>>,
    state_store: Option<Arc<dyn StateStore>>,
    store: Arc<ManagedObjectStore>,
    register_bootstrap_objects: bool,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            config: AgentConfig::default(),
            communities: CommunityTable::new(),
            vacm: VacmBuilder::new(),
            targets: Vec::new(),
            sink: None,
            state_store: None,
            store: Arc::new(ManagedObjectStore::new()),
            register_bootstrap_objects: false,
        }
    }

    /// Start from an existing configuration.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the local bind address (default: `0.0.0.0:161`).
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Set the engine ID that keys persisted state.
    pub fn engine_id(mut self, engine_id: impl Into<Bytes>) -> Self {
        self.config.engine_id = engine_id.into();
        self
    }

    /// Add rows to the community table.
    pub fn communities<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut CommunityTable),
    {
        configure(&mut self.communities);
        self
    }

    /// Configure VACM groups, access entries and views.
    pub fn vacm<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(VacmBuilder) -> VacmBuilder,
    {
        self.vacm = configure(std::mem::take(&mut self.vacm));
        self
    }

    /// Apply the example configuration from [`bootstrap`].
    ///
    /// Replaces the community and VACM tables configured so far, and
    /// registers the example scalars when the agent is built.
    pub fn bootstrap(mut self) -> Self {
        self.communities = bootstrap::community_table();
        self.vacm = VacmBuilder::from_config(bootstrap::vacm());
        self.register_bootstrap_objects = true;
        self
    }

    pub fn notification_target(mut self, target: NotificationTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Replace the default UDP notification sink.
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Where boots and the configuration snapshot live (default: in memory).
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Share an existing object store.
    pub fn store(mut self, store: Arc<ManagedObjectStore>) -> Self {
        self.store = store;
        self
    }

    /// Cap on requests processed at once (default: 64).
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.config.max_concurrent_requests = limit;
        self
    }

    pub fn authentication_failure_traps(mut self, enabled: bool) -> Self {
        self.config.authentication_failure_traps = enabled;
        self
    }

    /// Largest response the agent sends (default: 65507).
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Validate the configuration and bind the UDP socket.
    ///
    /// Requests are not served until [`Agent::start`].
    pub async fn build(self) -> Result<Agent> {
        self.config.validate()?;
        tracing::debug!(bind_addr = %self.config.bind_addr, "building agent");

        let bind_addr: SocketAddr = self.config.bind_addr.parse().map_err(|_| Error::Io {
            target: None,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid bind address: {}", self.config.bind_addr),
            ),
        })?;

        let socket = bind_udp_socket(bind_addr, Some(SOCKET_RECV_BUFFER))
            .await
            .map_err(|source| Error::Io {
                target: Some(bind_addr),
                source,
            })?;
        let local_addr = socket.local_addr().map_err(|source| Error::Io {
            target: Some(bind_addr),
            source,
        })?;

        if self.register_bootstrap_objects {
            bootstrap::register_managed_objects(&self.store)?;
        }

        let stats = Arc::new(AgentStats::default());
        let vacm = Arc::new(self.vacm.build());
        let dispatcher = Dispatcher::new(self.store, Arc::new(self.communities), Arc::clone(&vacm))
            .with_max_message_size(self.config.max_message_size)
            .with_stats(Arc::clone(&stats));

        let agent_addr = match local_addr.ip() {
            IpAddr::V4(ip) => ip.octets(),
            IpAddr::V6(ip) => ip.to_ipv4_mapped().map_or([0; 4], |v4| v4.octets()),
        };
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(UdpNotificationSink));
        let originator = NotificationOriginator::new(self.targets, sink, vacm, Instant::now())
            .with_agent_addr(agent_addr)
            .with_stats(stats);

        tracing::debug!(snmp.local_addr = %local_addr, "agent socket bound");

        Ok(Agent {
            config: self.config,
            socket: Arc::new(socket),
            local_addr,
            dispatcher: Arc::new(dispatcher),
            originator: Arc::new(originator),
            state_store: self
                .state_store
                .unwrap_or_else(|| Arc::new(MemoryStateStore::new())),
            cancel: CancellationToken::new(),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::Idle),
            boots: AtomicU32::new(0),
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

enum Lifecycle {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

/// A running SNMP agent.
///
/// Built by [`Agent::builder`]. The socket is bound at build time,
/// [`start`](Agent::start) begins serving, and [`shutdown`](Agent::shutdown)
/// stops the listener and persists the configuration.
pub struct Agent {
    config: AgentConfig,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    originator: Arc<NotificationOriginator>,
    state_store: Arc<dyn StateStore>,
    cancel: CancellationToken,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    boots: AtomicU32,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("local_addr", &self.local_addr)
            .field("engine_id", &to_hex(&self.config.engine_id))
            .field("boots", &self.boots())
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Begin serving requests.
    ///
    /// Increments the persisted boot counter, spawns the receive loop and
    /// sends coldStart to the notification targets. Calling it on a running
    /// agent does nothing. A stopped agent cannot be restarted.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Stopped => return Err(Error::Config("agent has been shut down".into())),
            Lifecycle::Idle => {}
        }

        let boots = self
            .state_store
            .increment_boots(&self.config.engine_id)
            .await?;
        self.boots.store(boots, Ordering::Relaxed);

        let listener = Listener {
            socket: Arc::clone(&self.socket),
            dispatcher: Arc::clone(&self.dispatcher),
            originator: Arc::clone(&self.originator),
            permits: Arc::new(Semaphore::new(self.config.max_concurrent_requests)),
            cancel: self.cancel.clone(),
            auth_traps: self.config.authentication_failure_traps,
        };
        *lifecycle = Lifecycle::Running(tokio::spawn(listener.run()));

        tracing::info!(
            snmp.local_addr = %self.local_addr,
            engine_id = %to_hex(&self.config.engine_id),
            boots,
            "agent started"
        );

        self.originator.notify(&cold_start(), &[]).await;
        Ok(())
    }

    /// Stop serving and persist the configuration snapshot.
    ///
    /// Safe to call any number of times, before or after `start`. Requests
    /// already being processed finish on their own tasks; a SET that has
    /// begun committing always completes.
    pub async fn shutdown(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let previous = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped);
        match previous {
            Lifecycle::Stopped => return Ok(()),
            Lifecycle::Idle => {}
            Lifecycle::Running(handle) => {
                self.cancel.cancel();
                if let Err(err) = handle.await {
                    tracing::warn!(error = %err, "receive loop ended abnormally");
                }
            }
        }

        let snapshot = self.config_snapshot();
        self.state_store
            .save_config(&self.config.engine_id, &snapshot)
            .await?;
        tracing::info!(snmp.local_addr = %self.local_addr, "agent stopped");
        Ok(())
    }

    /// Register a managed object in `context`.
    pub fn register_managed_object(
        &self,
        object: Arc<dyn ManagedObject>,
        context: &[u8],
    ) -> std::result::Result<(), RegistrationError> {
        self.dispatcher.store().register(object, context)
    }

    /// Remove the object registered at `oid` in `context`.
    pub fn unregister_managed_object(
        &self,
        oid: &Oid,
        context: &[u8],
    ) -> std::result::Result<Arc<dyn ManagedObject>, RegistrationError> {
        self.dispatcher.store().unregister(oid, context)
    }

    /// Send a notification to every permitted target.
    pub async fn notify(&self, trap_oid: &Oid, varbinds: &[VarBind]) -> usize {
        self.originator.notify(trap_oid, varbinds).await
    }

    /// The tables [`shutdown`](Agent::shutdown) persists.
    pub fn config_snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            engine_id: to_hex(&self.config.engine_id),
            communities: self.dispatcher.communities().clone(),
            vacm: self.dispatcher.vacm().snapshot(),
            notification_targets: self.originator.targets().to_vec(),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Boot count of this run, 0 before `start`.
    pub fn boots(&self) -> u32 {
        self.boots.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.dispatcher.stats()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn store(&self) -> &Arc<ManagedObjectStore> {
        self.dispatcher.store()
    }

    pub fn originator(&self) -> &NotificationOriginator {
        &self.originator
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State shared by the receive loop.
struct Listener {
    socket: Arc<UdpSocket>,
    dispatcher: Arc<Dispatcher>,
    originator: Arc<NotificationOriginator>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    auth_traps: bool,
}

impl Listener {
    async fn run(self) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let (len, source) = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP port unreachable from an earlier reply surfaces here on some platforms
                        tracing::warn!(error = %e, "agent recv error");
                        continue;
                    }
                },
            };
            tracing::trace!(snmp.source = %source, snmp.bytes = len, "agent received packet");
            let data = Bytes::copy_from_slice(&buf[..len]);

            let permit = tokio::select! {
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let socket = Arc::clone(&self.socket);
            let dispatcher = Arc::clone(&self.dispatcher);
            let originator = Arc::clone(&self.originator);
            let auth_traps = self.auth_traps;
            tokio::spawn(async move {
                let _permit = permit;
                match dispatcher.handle_datagram(data, Some(source)).await {
                    Ok(Some(reply)) => {
                        if let Err(e) = socket.send_to(&reply, source).await {
                            tracing::warn!(snmp.target = %source, error = %e, "failed to send response");
                        }
                    }
                    Ok(None) => {}
                    Err(err) if dispatch::is_unknown_identity(&err) => {
                        if auth_traps {
                            originator.notify(&authentication_failure(), &[]).await;
                        }
                    }
                    Err(err) => {
                        tracing::debug!(snmp.source = %source, error = %err, "dropping undecodable datagram");
                    }
                }
            });
        }

        tracing::debug!("receive loop stopped");
    }
}
