//! snmp-agentd: run the example SNMP agent.
//!
//! Serves the bootstrap configuration (community `private`, view
//! `systemview` over the vendor subtree, two read-only scalars) until
//! interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_snmp_agent::agent::{
    Agent, FileStateStore, MemoryStateStore, NotificationTarget, SNMP_TRAPS,
    StateStore, bootstrap,
};
use async_snmp_agent::util::parse_hex;
use async_snmp_agent::{Oid, Result, Version};
use bytes::Bytes;
use clap::Parser;
use tracing_subscriber::EnvFilter;

const NOTIFY_VIEW: &str = "trapview";

/// Minimal SNMP agent.
#[derive(Debug, Parser)]
#[command(name = "snmp-agentd", version, about)]
struct Args {
    /// Local address to listen on.
    #[arg(long, default_value = "0.0.0.0:161")]
    bind: String,

    /// Directory for the boot counter and configuration snapshot.
    /// State is kept in memory when omitted.
    #[arg(long, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Engine ID as hex, e.g. 800054c7046c6162.
    #[arg(long, value_parser = parse_engine_id)]
    engine_id: Option<Bytes>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Trap receiver (repeatable).
    #[arg(long, value_name = "ADDR")]
    trap_target: Vec<SocketAddr>,

    /// Trap format sent to receivers: v1 or v2c.
    #[arg(long, default_value = "v2c", value_parser = parse_trap_version)]
    trap_version: Version,

    /// Community sent to trap receivers.
    #[arg(long, default_value = "private")]
    trap_community: String,

    /// Send authenticationFailure traps for unknown communities.
    #[arg(long)]
    auth_traps: bool,
}

fn parse_engine_id(s: &str) -> std::result::Result<Bytes, String> {
    match parse_hex(s) {
        Some(id) if (5..=32).contains(&id.len()) => Ok(Bytes::from(id)),
        Some(id) => Err(format!("engine ID must be 5 to 32 octets, got {}", id.len())),
        None => Err(format!("invalid hex: {s}")),
    }
}

fn parse_trap_version(s: &str) -> std::result::Result<Version, String> {
    let version: Version = s.parse()?;
    if version.is_community() {
        Ok(version)
    } else {
        Err(format!("{version} traps need an external security layer"))
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let state: Arc<dyn StateStore> = match &args.state_dir {
        Some(dir) => Arc::new(FileStateStore::new(dir)),
        None => Arc::new(MemoryStateStore::new()),
    };

    let mut builder = Agent::builder()
        .bind(args.bind)
        .bootstrap()
        .state_store(state)
        .authentication_failure_traps(args.auth_traps);
    if let Some(engine_id) = args.engine_id {
        builder = builder.engine_id(engine_id);
    }
    let trap_version = args.trap_version;
    if !args.trap_target.is_empty() {
        // The bootstrap access entry has no notify view
        builder = builder.vacm(|v| {
            v.view(NOTIFY_VIEW, |view| view.include(Oid::from_slice(SNMP_TRAPS)))
                .access(bootstrap::GROUP_NAME, |a| {
                    a.security_model(trap_version.security_model())
                        .read_view(bootstrap::READ_VIEW)
                        .notify_view(NOTIFY_VIEW)
                })
        });
    }
    for address in args.trap_target {
        builder = builder.notification_target(NotificationTarget::community(
            address,
            trap_version,
            args.trap_community.clone(),
            bootstrap::SECURITY_NAME,
        ));
    }

    let agent = builder.build().await?;
    agent.start().await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to wait for interrupt");
    }
    tracing::info!("interrupt received, shutting down");
    agent.shutdown().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "agent failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
