//! Ready-made managed objects.
//!
//! [`Scalar`] holds a single value at an instance OID. [`Table`] owns a
//! prefix and serves `prefix.column.index` instances out of an
//! [`OidTable`]. [`ManagedObjectFactory`] builds the common read-only and
//! read-write scalars.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::oid::Oid;
use crate::value::{Syntax, Value};
use crate::varbind::VarBind;

use super::{
    BoxFuture, GetNextResult, GetResult, ManagedObject, OidTable, RequestContext, SetResult,
};

/// Maximum access of an object or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Common SET validation: access, syntax, then length.
fn validate(access: Access, syntax: Syntax, max_length: Option<usize>, value: &Value) -> SetResult {
    if access != Access::ReadWrite {
        return SetResult::NotWritable;
    }
    if !syntax.accepts(value) {
        return SetResult::WrongType;
    }
    if let (Some(max), Some(bytes)) = (max_length, value.as_bytes())
        && bytes.len() > max
    {
        return SetResult::WrongLength;
    }
    SetResult::Ok
}

/// A scalar object.
pub struct Scalar {
    oid: Oid,
    syntax: Syntax,
    access: Access,
    max_length: Option<usize>,
    value: RwLock<Value>,
}

impl Scalar {
    /// Create a scalar. The value's syntax becomes the object's syntax;
    /// a NULL or exception value defaults to OCTET STRING.
    pub fn new(oid: Oid, access: Access, value: Value) -> Self {
        let syntax = value.syntax().unwrap_or(Syntax::OctetString);
        Self {
            oid,
            syntax,
            access,
            max_length: None,
            value: RwLock::new(value),
        }
    }

    /// Limit OCTET STRING / Opaque values to `max` octets on SET.
    pub fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Current value.
    pub fn value(&self) -> Value {
        self.value.read().clone()
    }

    /// Replace the value from the agent side (not subject to access).
    pub fn set_value(&self, value: Value) {
        *self.value.write() = value;
    }
}

impl std::fmt::Debug for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scalar")
            .field("oid", &self.oid)
            .field("syntax", &self.syntax)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

impl ManagedObject for Scalar {
    fn oid(&self) -> &Oid {
        &self.oid
    }

    fn get<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid) -> BoxFuture<'a, GetResult> {
        Box::pin(async move { GetResult::Value(self.value()) })
    }

    fn get_next<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        oid: &'a Oid,
    ) -> BoxFuture<'a, GetNextResult> {
        Box::pin(async move {
            if oid < &self.oid {
                GetNextResult::Value(VarBind::new(self.oid.clone(), self.value()))
            } else {
                GetNextResult::EndOfMibView
            }
        })
    }

    fn test_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _oid: &'a Oid,
        value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async move { validate(self.access, self.syntax, self.max_length, value) })
    }

    fn commit_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _oid: &'a Oid,
        value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async move {
            if self.access != Access::ReadWrite {
                return SetResult::NotWritable;
            }
            self.set_value(value.clone());
            SetResult::Ok
        })
    }

    fn undo_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _oid: &'a Oid,
        previous: Option<&'a Value>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Some(previous) = previous {
                self.set_value(previous.clone());
            }
        })
    }
}

/// Column definition of a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub syntax: Syntax,
    pub access: Access,
    pub max_length: Option<usize>,
}

impl Column {
    pub fn read_only(syntax: Syntax) -> Self {
        Self {
            syntax,
            access: Access::ReadOnly,
            max_length: None,
        }
    }

    pub fn read_write(syntax: Syntax) -> Self {
        Self {
            syntax,
            access: Access::ReadWrite,
            max_length: None,
        }
    }
}

/// A conceptual table: instances are `prefix.column.index...`.
///
/// The table owns its entire prefix subtree. GET on an undefined column
/// answers noSuchObject, on a missing row noSuchInstance. SET on a missing
/// row answers noCreation unless row creation is enabled.
pub struct Table {
    prefix: Oid,
    columns: BTreeMap<u32, Column>,
    rows: RwLock<OidTable<Value>>,
    row_creation: bool,
}

impl Table {
    pub fn new(prefix: Oid) -> Self {
        Self {
            prefix,
            columns: BTreeMap::new(),
            rows: RwLock::new(OidTable::new()),
            row_creation: false,
        }
    }

    /// Define a column.
    pub fn column(mut self, id: u32, column: Column) -> Self {
        self.columns.insert(id, column);
        self
    }

    /// Allow SET to create instances of writable columns.
    pub fn with_row_creation(mut self) -> Self {
        self.row_creation = true;
        self
    }

    /// Insert or replace a cell. The instance OID is `prefix.column.index`.
    pub fn set_cell(&self, column: u32, index: &[u32], value: Value) {
        let oid = self.prefix.child(column).join(index);
        self.rows.write().insert(oid, value);
    }

    /// Remove every cell of the row with `index`.
    pub fn remove_row(&self, index: &[u32]) {
        let mut rows = self.rows.write();
        for &column in self.columns.keys() {
            rows.remove(&self.prefix.child(column).join(index));
        }
    }

    /// Number of populated cells.
    pub fn cell_count(&self) -> usize {
        self.rows.read().len()
    }

    fn column_of(&self, oid: &Oid) -> Option<&Column> {
        let suffix = oid.strip_prefix(&self.prefix)?;
        let (&id, index) = suffix.split_first()?;
        if index.is_empty() {
            return None;
        }
        self.columns.get(&id)
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("prefix", &self.prefix)
            .field("columns", &self.columns)
            .field("cells", &self.cell_count())
            .finish()
    }
}

impl ManagedObject for Table {
    fn oid(&self) -> &Oid {
        &self.prefix
    }

    fn is_tabular(&self) -> bool {
        true
    }

    fn get<'a>(&'a self, _ctx: &'a RequestContext, oid: &'a Oid) -> BoxFuture<'a, GetResult> {
        Box::pin(async move {
            if self.column_of(oid).is_none() {
                return GetResult::NoSuchObject;
            }
            match self.rows.read().get(oid) {
                Some(value) => GetResult::Value(value.clone()),
                None => GetResult::NoSuchInstance,
            }
        })
    }

    fn get_next<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        oid: &'a Oid,
    ) -> BoxFuture<'a, GetNextResult> {
        Box::pin(async move {
            self.rows
                .read()
                .get_next(oid)
                .map(|(next, value)| VarBind::new(next.clone(), value.clone()))
                .into()
        })
    }

    fn test_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        oid: &'a Oid,
        value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async move {
            let Some(column) = self.column_of(oid) else {
                return SetResult::NoCreation;
            };
            let exists = self.rows.read().get(oid).is_some();
            if !exists && !(self.row_creation && column.access == Access::ReadWrite) {
                return SetResult::NoCreation;
            }
            validate(column.access, column.syntax, column.max_length, value)
        })
    }

    fn commit_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        oid: &'a Oid,
        value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async move {
            self.rows.write().insert(oid.clone(), value.clone());
            SetResult::Ok
        })
    }

    fn undo_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        oid: &'a Oid,
        previous: Option<&'a Value>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut rows = self.rows.write();
            match previous {
                Some(value) => rows.insert(oid.clone(), value.clone()),
                None => {
                    rows.remove(oid);
                }
            }
        })
    }
}

/// Shorthand constructors for scalars.
pub struct ManagedObjectFactory;

impl ManagedObjectFactory {
    /// A read-only scalar.
    pub fn read_only(oid: Oid, value: impl Into<Value>) -> Arc<Scalar> {
        Arc::new(Scalar::new(oid, Access::ReadOnly, value.into()))
    }

    /// A read-write scalar.
    pub fn read_write(oid: Oid, value: impl Into<Value>) -> Arc<Scalar> {
        Arc::new(Scalar::new(oid, Access::ReadWrite, value.into()))
    }
}
