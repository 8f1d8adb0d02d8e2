//! # async-snmp-agent
//!
//! Async SNMP agent core for Rust.
//!
//! The crate exposes a tree of managed objects over SNMPv1 and SNMPv2c,
//! enforces view-based access control (RFC 3415) on every variable binding,
//! and emits notifications. SNMPv3 principals can be dispatched directly
//! once an external security engine has authenticated the message.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use async_snmp_agent::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> async_snmp_agent::Result<()> {
//!     let agent = Agent::builder()
//!         .bind("0.0.0.0:1161")
//!         .communities(|c| {
//!             c.community("private", "notConfigUser", "");
//!         })
//!         .vacm(|v| {
//!             v.group("notConfigUser", SecurityModel::V2c, "readers")
//!                 .access("readers", |a| a.read_view("vendor"))
//!                 .view("vendor", |view| view.include(oid!(1, 3, 6, 1, 4, 1, 21703, 7500)))
//!         })
//!         .build()
//!         .await?;
//!
//!     agent.register_managed_object(
//!         ManagedObjectFactory::read_only(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0), "1"),
//!         b"",
//!     )?;
//!
//!     agent.start().await?;
//!     tokio::signal::ctrl_c().await.ok();
//!     agent.shutdown().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`agent`] - store, community table, VACM, dispatcher, notifications, listener
//! - [`handler`] - the [`ManagedObject`](handler::ManagedObject) trait and ready-made objects
//! - [`message`], [`pdu`], [`ber`] - the v1/v2c wire format

pub mod agent;
pub mod ber;
pub mod error;
pub mod handler;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod prelude;
pub mod util;
pub mod value;
pub mod varbind;
pub mod version;

pub use agent::{Agent, AgentBuilder, AgentConfig};
pub use error::{Error, ErrorStatus, RegistrationError, Result};
pub use oid::Oid;
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
