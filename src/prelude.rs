//! Commonly used types in one import.
//!
//! ```rust,no_run
//! use async_snmp_agent::prelude::*;
//! ```
//!
//! This brings in:
//! - The agent: [`Agent`], [`NotificationTarget`]
//! - Objects: [`ManagedObject`], [`ManagedObjectFactory`], [`Scalar`], [`Table`]
//! - Access control: [`VacmBuilder`], [`View`], [`SecurityModel`], [`SecurityLevel`]
//! - Core types: [`Oid`], [`Value`], [`VarBind`], [`Version`]
//! - Error handling: [`Error`], [`Result`]
//! - The [`oid!`] macro for compile-time OID construction

pub use crate::agent::{Agent, NotificationTarget, SecurityModel, VacmBuilder, View};
pub use crate::error::{Error, Result};
pub use crate::handler::{ManagedObject, ManagedObjectFactory, Scalar, Table};
pub use crate::message::SecurityLevel;
pub use crate::oid::Oid;
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
