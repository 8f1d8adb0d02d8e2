//! The ManagedObject trait.

use std::future::Future;
use std::pin::Pin;

use crate::oid::Oid;
use crate::value::Value;

use super::{GetNextResult, GetResult, RequestContext, SetResult};

/// Type alias for boxed async return type (dyn-compatible).
///
/// Managed objects are stored as `Arc<dyn ManagedObject>` in the store, so
/// their methods return boxed futures rather than using `async fn`.
///
/// ```rust
/// use async_snmp_agent::handler::{BoxFuture, GetResult};
/// use async_snmp_agent::Value;
///
/// fn answer<'a>(value: &'a i32) -> BoxFuture<'a, GetResult> {
///     Box::pin(async move { GetResult::Value(Value::Integer(*value)) })
/// }
/// ```
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A managed object registered in the store.
///
/// An object is identified by its [`oid`](ManagedObject::oid). A scalar
/// owns exactly that OID (conventionally ending in `.0`). A tabular object
/// owns every OID that starts with it. No two registrations in a context may
/// claim overlapping OIDs.
///
/// The store only routes OIDs the object [`covers`](ManagedObject::covers)
/// to `get` and the SET methods. `get_next` may receive any OID sorting at or
/// before the object's range and must answer with the first instance of its
/// own that sorts strictly after it.
///
/// # SET
///
/// SET is two-phase. `test_set` is called for every binding of a request
/// before `commit_set` is called for any of them, and must not change
/// state. If a commit fails, `undo_set` is called in reverse order for the
/// bindings already committed, with the value each held before the request
/// (`None` if the instance did not exist).
///
/// The default SET methods make the object read-only.
///
/// ```rust
/// use async_snmp_agent::handler::{
///     BoxFuture, GetNextResult, GetResult, ManagedObject, RequestContext,
/// };
/// use async_snmp_agent::{oid, Oid, Value, VarBind};
///
/// struct Uptime {
///     oid: Oid,
/// }
///
/// impl ManagedObject for Uptime {
///     fn oid(&self) -> &Oid {
///         &self.oid
///     }
///
///     fn get<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid) -> BoxFuture<'a, GetResult> {
///         Box::pin(async move { GetResult::Value(Value::TimeTicks(4200)) })
///     }
///
///     fn get_next<'a>(
///         &'a self,
///         _ctx: &'a RequestContext,
///         oid: &'a Oid,
///     ) -> BoxFuture<'a, GetNextResult> {
///         Box::pin(async move {
///             if oid < &self.oid {
///                 GetNextResult::Value(VarBind::new(self.oid.clone(), Value::TimeTicks(4200)))
///             } else {
///                 GetNextResult::EndOfMibView
///             }
///         })
///     }
/// }
///
/// let uptime = Uptime { oid: oid!(1, 3, 6, 1, 2, 1, 1, 3, 0) };
/// assert!(uptime.covers(&oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)));
/// assert!(!uptime.covers(&oid!(1, 3, 6, 1, 2, 1, 1, 3, 1)));
/// ```
pub trait ManagedObject: Send + Sync + 'static {
    /// Scalar instance OID, or the table prefix.
    fn oid(&self) -> &Oid;

    /// Whether this object owns the whole subtree under [`oid`](Self::oid).
    fn is_tabular(&self) -> bool {
        false
    }

    /// Whether `oid` falls inside this object's range.
    fn covers(&self, oid: &Oid) -> bool {
        if self.is_tabular() {
            oid.starts_with(self.oid())
        } else {
            oid == self.oid()
        }
    }

    /// Whether this object's range overlaps `other`'s.
    fn overlaps(&self, other: &dyn ManagedObject) -> bool {
        self.covers(other.oid()) || other.covers(self.oid())
    }

    /// Read one instance. `oid` is always covered by this object.
    fn get<'a>(&'a self, ctx: &'a RequestContext, oid: &'a Oid) -> BoxFuture<'a, GetResult>;

    /// First instance of this object strictly after `oid`.
    fn get_next<'a>(
        &'a self,
        ctx: &'a RequestContext,
        oid: &'a Oid,
    ) -> BoxFuture<'a, GetNextResult>;

    /// Validate a SET binding without changing state.
    fn test_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _oid: &'a Oid,
        _value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::NotWritable })
    }

    /// Apply a validated SET binding.
    fn commit_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _oid: &'a Oid,
        _value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::NotWritable })
    }

    /// Restore the value an instance held before a failed SET.
    ///
    /// Best effort: failures are logged by the caller and otherwise ignored.
    fn undo_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _oid: &'a Oid,
        _previous: Option<&'a Value>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}
