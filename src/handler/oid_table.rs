//! Sorted instance storage for tabular objects.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::oid::Oid;

/// Sorted OID-to-value map with GETNEXT lookup.
///
/// Backs [`Table`](super::Table). `Oid` orders lexicographically by arc, so
/// the successor of any OID is the first key in the excluded range above it.
#[derive(Debug, Clone)]
pub struct OidTable<V> {
    rows: BTreeMap<Oid, V>,
}

impl<V> OidTable<V> {
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }

    /// Insert or replace the value stored at `oid`.
    pub fn insert(&mut self, oid: Oid, value: V) {
        self.rows.insert(oid, value);
    }

    pub fn remove(&mut self, oid: &Oid) -> Option<V> {
        self.rows.remove(oid)
    }

    pub fn get(&self, oid: &Oid) -> Option<&V> {
        self.rows.get(oid)
    }

    /// First entry strictly after `oid`, or `None` past the last row.
    pub fn get_next(&self, oid: &Oid) -> Option<(&Oid, &V)> {
        self.rows
            .range((Bound::Excluded(oid), Bound::Unbounded))
            .next()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Entries in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&Oid, &V)> {
        self.rows.iter()
    }
}

impl<V> Default for OidTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
