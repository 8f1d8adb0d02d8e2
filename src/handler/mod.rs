//! Managed objects and the types they exchange with the dispatcher.
//!
//! - [`ManagedObject`] - trait for anything registered in the store
//! - [`Scalar`], [`Table`], [`ManagedObjectFactory`] - ready-made objects
//! - [`RequestContext`], [`Principal`] - who is asking, and for what
//! - [`GetResult`], [`GetNextResult`], [`SetResult`], [`Response`] - outcomes
//! - [`OidTable`] - sorted instance storage
//!
//! Objects answer for their own instances only. Access control, view
//! filtering and the walk across objects happen in the dispatcher, so an
//! object never needs to know who may see it.
//!
//! ```rust
//! use async_snmp_agent::handler::{ManagedObject, ManagedObjectFactory};
//! use async_snmp_agent::oid;
//!
//! let watermark = ManagedObjectFactory::read_only(
//!     oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 2, 10, 0),
//!     "120",
//! );
//! assert_eq!(watermark.oid().to_string(), "1.3.6.1.4.1.21703.7500.3.2.10.0");
//! ```

mod context;
mod objects;
mod oid_table;
mod results;
mod traits;

pub use context::{Principal, RequestContext};
pub use objects::{Access, Column, ManagedObjectFactory, Scalar, Table};
pub use oid_table::OidTable;
pub use results::{GetNextResult, GetResult, Response, SetResult};
pub use traits::{BoxFuture, ManagedObject};

// Re-export SecurityModel from agent::vacm for convenience
pub use crate::agent::vacm::SecurityModel;
