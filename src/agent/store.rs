//! Managed Object Store.
//!
//! An ordered index of OID to [`ManagedObject`], partitioned by context.
//! Readers work on an immutable [`Snapshot`]; `register`, `unregister` and
//! `add_context` build a new snapshot and swap it in, so a reader sees
//! either the full state before a mutation or the full state after it.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::RegistrationError;
use crate::handler::{GetNextResult, ManagedObject, RequestContext};
use crate::oid::Oid;

type ObjectMap = BTreeMap<Oid, Arc<dyn ManagedObject>>;

/// Immutable view of the store at one point in time.
#[derive(Clone)]
pub struct Snapshot {
    contexts: HashMap<Bytes, ObjectMap>,
}

impl Default for Snapshot {
    fn default() -> Self {
        let mut contexts = HashMap::new();
        contexts.insert(Bytes::new(), ObjectMap::new());
        Self { contexts }
    }
}

impl Snapshot {
    /// The object whose range contains `oid`.
    pub fn lookup(&self, context: &[u8], oid: &Oid) -> Option<Arc<dyn ManagedObject>> {
        // Any covering object's key is a prefix of `oid`, and no other key
        // can sort between it and `oid` without overlapping it.
        let (_, object) = self.contexts.get(context)?.range(..=oid).next_back()?;
        object.covers(oid).then(|| Arc::clone(object))
    }

    /// The first instance strictly after `oid` in `context`.
    pub async fn lookup_next(
        &self,
        ctx: &RequestContext,
        context: &[u8],
        oid: &Oid,
    ) -> GetNextResult {
        let Some(objects) = self.contexts.get(context) else {
            return GetNextResult::EndOfMibView;
        };

        // The object at or before `oid` may still have instances after it
        // (a table prefix, or a scalar OID that `oid` is a prefix of).
        let at_or_before = objects.range(..=oid).next_back();
        let after = objects.range((Bound::Excluded(oid), Bound::Unbounded));

        for (_, object) in at_or_before.into_iter().chain(after) {
            if let GetNextResult::Value(vb) = object.get_next(ctx, oid).await
                && vb.oid > *oid
            {
                return GetNextResult::Value(vb);
            }
        }
        GetNextResult::EndOfMibView
    }

    /// Whether `context` exists.
    pub fn has_context(&self, context: &[u8]) -> bool {
        self.contexts.contains_key(context)
    }

    /// Registered base OIDs in `context`, in order.
    pub fn registered_oids(&self, context: &[u8]) -> Vec<Oid> {
        self.contexts
            .get(context)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (context, objects) in &self.contexts {
            map.entry(
                &String::from_utf8_lossy(context),
                &objects.keys().collect::<Vec<_>>(),
            );
        }
        map.finish()
    }
}

/// The Managed Object Store.
#[derive(Debug, Default)]
pub struct ManagedObjectStore {
    current: RwLock<Arc<Snapshot>>,
}

impl ManagedObjectStore {
    /// Create a store with only the default context `""`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Hold on to it for the duration of one request.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Snapshot) -> Result<T, RegistrationError>,
    ) -> Result<T, RegistrationError> {
        let mut current = self.current.write();
        let mut next = Snapshot::clone(&current);
        let out = f(&mut next)?;
        *current = Arc::new(next);
        Ok(out)
    }

    /// Add a context. Adding an existing context is a no-op.
    pub fn add_context(&self, context: impl Into<Bytes>) {
        let context = context.into();
        let _ = self.mutate(|snapshot| {
            snapshot.contexts.entry(context.clone()).or_default();
            Ok(())
        });
        tracing::debug!(context = %String::from_utf8_lossy(&context), "context added");
    }

    /// Register an object in `context`.
    pub fn register(
        &self,
        object: Arc<dyn ManagedObject>,
        context: &[u8],
    ) -> Result<(), RegistrationError> {
        let oid = object.oid().clone();
        self.mutate(|snapshot| {
            let objects = snapshot.contexts.get_mut(context).ok_or_else(|| {
                RegistrationError::UnknownContext {
                    context: Bytes::copy_from_slice(context),
                }
            })?;

            // Only the neighbours on either side can overlap a new range
            // (a table may cover several keys after it, and the first is enough).
            let before = objects.range(..=&oid).next_back();
            let after = objects
                .range((Bound::Excluded(&oid), Bound::Unbounded))
                .next();
            if let Some((existing, _)) = before
                .into_iter()
                .chain(after)
                .find(|(_, other)| other.overlaps(object.as_ref()))
            {
                return Err(RegistrationError::DuplicateRegistration {
                    oid: oid.clone(),
                    existing: existing.clone(),
                    context: Bytes::copy_from_slice(context),
                });
            }

            objects.insert(oid.clone(), object);
            Ok(())
        })?;

        tracing::debug!(snmp.oid = %oid, context = %String::from_utf8_lossy(context), "managed object registered");
        Ok(())
    }

    /// Unregister the object registered at `oid` in `context`.
    pub fn unregister(
        &self,
        oid: &Oid,
        context: &[u8],
    ) -> Result<Arc<dyn ManagedObject>, RegistrationError> {
        let removed = self.mutate(|snapshot| {
            snapshot
                .contexts
                .get_mut(context)
                .and_then(|objects| objects.remove(oid))
                .ok_or_else(|| RegistrationError::NotRegistered {
                    oid: oid.clone(),
                    context: Bytes::copy_from_slice(context),
                })
        })?;

        tracing::debug!(snmp.oid = %oid, context = %String::from_utf8_lossy(context), "managed object unregistered");
        Ok(removed)
    }

    /// Exact-range lookup against the current snapshot.
    pub fn lookup(&self, context: &[u8], oid: &Oid) -> Option<Arc<dyn ManagedObject>> {
        self.snapshot().lookup(context, oid)
    }

    /// GETNEXT against the current snapshot.
    pub async fn lookup_next(
        &self,
        ctx: &RequestContext,
        context: &[u8],
        oid: &Oid,
    ) -> GetNextResult {
        let snapshot = self.snapshot();
        snapshot.lookup_next(ctx, context, oid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Column, ManagedObjectFactory, Principal, Table};
    use crate::oid;
    use crate::pdu::PduType;
    use crate::value::{Syntax, Value};
    use crate::version::Version;

    fn ctx() -> RequestContext {
        RequestContext::new(
            Principal::community(Version::V2c, "notConfigUser", ""),
            1,
            PduType::GetNextRequest,
        )
    }

    fn populated() -> ManagedObjectStore {
        let store = ManagedObjectStore::new();
        store
            .register(
                ManagedObjectFactory::read_only(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0), "1"),
                b"",
            )
            .unwrap();
        store
            .register(
                ManagedObjectFactory::read_only(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 2, 10, 0), "120"),
                b"",
            )
            .unwrap();
        store
    }

    #[test]
    fn test_register_duplicate_keeps_original() {
        let store = populated();
        let err = store
            .register(
                ManagedObjectFactory::read_only(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0), "other"),
                b"",
            )
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateRegistration { .. }));
        assert!(
            store
                .lookup(b"", &oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0))
                .is_some()
        );
    }

    #[test]
    fn test_register_table_overlapping_scalar() {
        let store = populated();
        let table = Arc::new(Table::new(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3)));
        let err = store.register(table, b"").unwrap_err();
        match err {
            RegistrationError::DuplicateRegistration { existing, .. } => {
                assert_eq!(existing, oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_register_scalar_inside_table() {
        let store = ManagedObjectStore::new();
        store
            .register(Arc::new(Table::new(oid!(1, 3, 6, 1, 4, 1, 21703, 2))), b"")
            .unwrap();
        let err = store
            .register(
                ManagedObjectFactory::read_only(oid!(1, 3, 6, 1, 4, 1, 21703, 2, 1, 1, 0), 1),
                b"",
            )
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateRegistration { .. }));
    }

    #[test]
    fn test_unregister() {
        let store = populated();
        let oid = oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0);
        store.unregister(&oid, b"").unwrap();
        assert!(store.lookup(b"", &oid).is_none());
        assert!(matches!(
            store.unregister(&oid, b""),
            Err(RegistrationError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_unknown_context() {
        let store = ManagedObjectStore::new();
        let object = ManagedObjectFactory::read_only(oid!(1, 3, 6, 1, 4, 1, 21703, 1, 0), 1);
        assert!(matches!(
            store.register(object.clone(), b"public"),
            Err(RegistrationError::UnknownContext { .. })
        ));
        store.add_context("public");
        store.register(object, b"public").unwrap();
        assert!(store.lookup(b"", &oid!(1, 3, 6, 1, 4, 1, 21703, 1, 0)).is_none());
    }

    #[test]
    fn test_lookup_requires_cover() {
        let store = populated();
        assert!(store.lookup(b"", &oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8)).is_none());
        assert!(store.lookup(b"", &oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0, 1)).is_none());
    }

    #[tokio::test]
    async fn test_lookup_next_order() {
        let store = populated();
        let ctx = ctx();
        let first = store.lookup_next(&ctx, b"", &oid!(1, 3)).await.into_option().unwrap();
        assert_eq!(first.oid, oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0));

        let second = store.lookup_next(&ctx, b"", &first.oid).await.into_option().unwrap();
        assert_eq!(second.oid, oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 2, 10, 0));
        assert_eq!(second.value, Value::from("120"));

        assert_eq!(
            store.lookup_next(&ctx, b"", &second.oid).await,
            GetNextResult::EndOfMibView
        );
    }

    #[tokio::test]
    async fn test_lookup_next_into_table() {
        let store = populated();
        let table = Table::new(oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 4))
            .column(1, Column::read_only(Syntax::Integer));
        table.set_cell(1, &[5], Value::Integer(5));
        store.register(Arc::new(table), b"").unwrap();
        let ctx = ctx();

        let next = store
            .lookup_next(&ctx, b"", &oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 2, 10, 0))
            .await
            .into_option()
            .unwrap();
        assert_eq!(next.oid, oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 4, 1, 5));

        // starting inside the table prefix
        let from_inside = store
            .lookup_next(&ctx, b"", &oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 4, 1))
            .await
            .into_option()
            .unwrap();
        assert_eq!(from_inside.oid, next.oid);
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_across_mutation() {
        let store = populated();
        let before = store.snapshot();
        store
            .unregister(&oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 2, 10, 0), b"")
            .unwrap();
        assert_eq!(before.registered_oids(b"").len(), 2);
        assert_eq!(store.snapshot().registered_oids(b"").len(), 1);
    }
}
