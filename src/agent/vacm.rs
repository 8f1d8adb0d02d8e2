//! View-based Access Control Model (RFC 3415).
//!
//! Three tables decide whether a principal may touch an OID:
//!
//! 1. **Security-to-group**: `(securityModel, securityName) -> groupName`.
//! 2. **Access**: `(group, contextPrefix, model, minimum level, match mode)`
//!    to the read, write and notify view names.
//! 3. **View tree family**: named views built from included and excluded
//!    subtrees, each with an optional wildcard mask.
//!
//! [`VacmConfig::check`] walks all three and either names the view that
//! permitted the request or says why it was refused.
//!
//! ```rust
//! use async_snmp_agent::agent::{AccessDenied, SecurityModel, VacmBuilder, ViewType};
//! use async_snmp_agent::message::SecurityLevel;
//! use async_snmp_agent::oid;
//!
//! let vacm = VacmBuilder::new()
//!     .group("notConfigUser", SecurityModel::V2c, "notConfigGroup")
//!     .access("notConfigGroup", |a| a.read_view("systemview"))
//!     .view("systemview", |v| v.include(oid!(1, 3, 6, 1, 4, 1, 21703, 7500)))
//!     .build();
//!
//! let permitted = vacm.check(
//!     b"notConfigUser",
//!     SecurityModel::V2c,
//!     SecurityLevel::NoAuthNoPriv,
//!     b"",
//!     &oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0),
//!     ViewType::Read,
//! );
//! assert_eq!(permitted.unwrap().as_ref(), b"systemview");
//!
//! let write = vacm.check(
//!     b"notConfigUser",
//!     SecurityModel::V2c,
//!     SecurityLevel::NoAuthNoPriv,
//!     b"",
//!     &oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0),
//!     ViewType::Write,
//! );
//! assert_eq!(write, Err(AccessDenied::NoSuchView));
//! ```

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::message::SecurityLevel;
use crate::oid::Oid;

/// Security model identifiers (RFC 3411).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityModel {
    /// Wildcard, matches any model.
    Any = 0,
    V1 = 1,
    V2c = 2,
    /// SNMPv3 User-based Security Model.
    Usm = 3,
}

impl fmt::Display for SecurityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityModel::Any => write!(f, "any"),
            SecurityModel::V1 => write!(f, "snmpv1"),
            SecurityModel::V2c => write!(f, "snmpv2c"),
            SecurityModel::Usm => write!(f, "usm"),
        }
    }
}

/// How an access entry's context prefix is compared to the request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContextMatch {
    #[default]
    Exact,
    Prefix,
}

/// Which of an access entry's three views a check consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewType {
    Read,
    Write,
    Notify,
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewType::Read => write!(f, "read"),
            ViewType::Write => write!(f, "write"),
            ViewType::Notify => write!(f, "notify"),
        }
    }
}

/// Reason an access check was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("security name is not mapped to a group")]
    NoSuchGroup,
    #[error("no access entry for group and context")]
    NoAccessEntry,
    #[error("access entry has no view for this operation")]
    NoSuchView,
    #[error("object is not in view")]
    NotInView,
    #[error("security level below the access entry minimum")]
    InsufficientLevel,
}

/// A named collection of OID subtrees.
///
/// Membership is decided by the longest matching subtree. When an included
/// and an excluded family match at the same length, the exclusion wins.
///
/// ```rust
/// use async_snmp_agent::agent::View;
/// use async_snmp_agent::oid;
///
/// let view = View::new()
///     .include(oid!(1, 3, 6, 1, 4, 1, 21703))
///     .exclude(oid!(1, 3, 6, 1, 4, 1, 21703, 9))
///     .include(oid!(1, 3, 6, 1, 4, 1, 21703, 9, 1));
///
/// assert!(view.contains(&oid!(1, 3, 6, 1, 4, 1, 21703, 7500, 3, 1, 8, 0)));
/// assert!(!view.contains(&oid!(1, 3, 6, 1, 4, 1, 21703, 9, 2)));
/// assert!(view.contains(&oid!(1, 3, 6, 1, 4, 1, 21703, 9, 1, 5)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    subtrees: Vec<ViewSubtree>,
}

impl View {
    /// An empty view contains nothing.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(self, oid: Oid) -> Self {
        self.family(oid, Vec::new(), true)
    }

    /// Include a subtree with a wildcard mask (see [`ViewSubtree::mask`]).
    pub fn include_masked(self, oid: Oid, mask: Vec<u8>) -> Self {
        self.family(oid, mask, true)
    }

    pub fn exclude(self, oid: Oid) -> Self {
        self.family(oid, Vec::new(), false)
    }

    pub fn exclude_masked(self, oid: Oid, mask: Vec<u8>) -> Self {
        self.family(oid, mask, false)
    }

    fn family(mut self, oid: Oid, mask: Vec<u8>, included: bool) -> Self {
        self.subtrees.push(ViewSubtree {
            oid,
            mask,
            included,
        });
        self
    }

    pub fn subtrees(&self) -> &[ViewSubtree] {
        &self.subtrees
    }

    /// Whether `oid` is in the view.
    pub fn contains(&self, oid: &Oid) -> bool {
        self.subtrees
            .iter()
            .filter(|s| s.matches(oid))
            .max_by_key(|s| (s.oid.len(), !s.included))
            .is_some_and(|s| s.included)
    }

    /// Whether any OID under `root` could be in the view.
    ///
    /// A walk under a root no included family reaches ends without
    /// scanning the store.
    pub fn may_contain_under(&self, root: &Oid) -> bool {
        self.subtrees.iter().any(|s| s.included && s.agrees(root))
    }
}

/// One view tree family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSubtree {
    pub oid: Oid,
    /// Wildcard mask, one bit per arc, most significant bit first.
    ///
    /// A 1 bit requires the arc to match. A 0 bit accepts any value. Arcs
    /// past the end of the mask must match, so an empty mask is a plain
    /// subtree.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mask: Vec<u8>,
    pub included: bool,
}

impl ViewSubtree {
    pub fn matches(&self, oid: &Oid) -> bool {
        oid.len() >= self.oid.len() && self.agrees(oid)
    }

    /// Family and `oid` agree on every arc both have, honouring the mask.
    fn agrees(&self, oid: &Oid) -> bool {
        self.oid
            .arcs()
            .iter()
            .zip(oid.arcs())
            .enumerate()
            .all(|(i, (f, c))| !self.arc_is_exact(i) || f == c)
    }

    fn arc_is_exact(&self, i: usize) -> bool {
        self.mask
            .get(i / 8)
            .is_none_or(|byte| (byte >> (7 - (i % 8))) & 1 == 1)
    }
}

/// Access table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacmAccessEntry {
    #[serde(with = "crate::util::serde_text")]
    pub group_name: Bytes,
    #[serde(with = "crate::util::serde_text")]
    pub context_prefix: Bytes,
    pub security_model: SecurityModel,
    /// Minimum security level.
    pub security_level: SecurityLevel,
    pub context_match: ContextMatch,
    #[serde(with = "crate::util::serde_text")]
    pub read_view: Bytes,
    #[serde(with = "crate::util::serde_text")]
    pub write_view: Bytes,
    #[serde(with = "crate::util::serde_text")]
    pub notify_view: Bytes,
}

impl VacmAccessEntry {
    pub fn view(&self, view_type: ViewType) -> &Bytes {
        match view_type {
            ViewType::Read => &self.read_view,
            ViewType::Write => &self.write_view,
            ViewType::Notify => &self.notify_view,
        }
    }

    fn context_matches(&self, context: &[u8]) -> bool {
        match self.context_match {
            ContextMatch::Exact => self.context_prefix.as_ref() == context,
            ContextMatch::Prefix => context.starts_with(&self.context_prefix),
        }
    }

    fn applies_to(&self, group: &[u8], context: &[u8], model: SecurityModel) -> bool {
        self.group_name.as_ref() == group
            && self.context_matches(context)
            && (self.security_model == model || self.security_model == SecurityModel::Any)
    }

    /// RFC 3415 preference: specific model, exact match, longer prefix,
    /// higher level. Tuples compare lexicographically.
    fn preference(&self, model: SecurityModel) -> (bool, bool, usize, SecurityLevel) {
        (
            self.security_model == model,
            self.context_match == ContextMatch::Exact,
            self.context_prefix.len(),
            self.security_level,
        )
    }
}

/// Builder for one access entry, used through [`VacmBuilder::access`].
///
/// Defaults: empty exact context, any model, noAuthNoPriv, no views.
pub struct AccessEntryBuilder {
    entry: VacmAccessEntry,
}

impl AccessEntryBuilder {
    pub fn new(group_name: impl Into<Bytes>) -> Self {
        Self {
            entry: VacmAccessEntry {
                group_name: group_name.into(),
                context_prefix: Bytes::new(),
                security_model: SecurityModel::Any,
                security_level: SecurityLevel::NoAuthNoPriv,
                context_match: ContextMatch::Exact,
                read_view: Bytes::new(),
                write_view: Bytes::new(),
                notify_view: Bytes::new(),
            },
        }
    }

    pub fn context_prefix(mut self, prefix: impl Into<Bytes>) -> Self {
        self.entry.context_prefix = prefix.into();
        self
    }

    pub fn security_model(mut self, model: SecurityModel) -> Self {
        self.entry.security_model = model;
        self
    }

    /// Requests below this level are refused with
    /// [`AccessDenied::InsufficientLevel`].
    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.entry.security_level = level;
        self
    }

    /// Match the context prefix against the start of the request context.
    pub fn context_match_prefix(mut self) -> Self {
        self.entry.context_match = ContextMatch::Prefix;
        self
    }

    pub fn read_view(mut self, view: impl Into<Bytes>) -> Self {
        self.entry.read_view = view.into();
        self
    }

    /// Leaving this empty makes the group read-only.
    pub fn write_view(mut self, view: impl Into<Bytes>) -> Self {
        self.entry.write_view = view.into();
        self
    }

    /// View consulted when deciding which notifications a target receives.
    pub fn notify_view(mut self, view: impl Into<Bytes>) -> Self {
        self.entry.notify_view = view.into();
        self
    }

    pub fn build(self) -> VacmAccessEntry {
        self.entry
    }
}

/// Group table row, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub security_model: SecurityModel,
    #[serde(with = "crate::util::serde_text")]
    pub security_name: Bytes,
    #[serde(with = "crate::util::serde_text")]
    pub group_name: Bytes,
}

/// Named view, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedView {
    #[serde(with = "crate::util::serde_text")]
    pub name: Bytes,
    #[serde(flatten)]
    pub view: View,
}

/// Serializable form of a [`VacmConfig`].
///
/// Groups are sorted by security name and model, views by name, so hash
/// order never leaks into the document. Access entries keep the order they
/// were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacmSnapshot {
    pub groups: Vec<GroupEntry>,
    pub access: Vec<VacmAccessEntry>,
    pub views: Vec<NamedView>,
}

/// VACM tables. Populated at startup, read-only while serving.
#[derive(Debug, Clone, Default)]
pub struct VacmConfig {
    security_to_group: HashMap<(SecurityModel, Bytes), Bytes>,
    access_entries: Vec<VacmAccessEntry>,
    views: HashMap<Bytes, View>,
}

impl VacmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(
        &mut self,
        security_name: impl Into<Bytes>,
        security_model: SecurityModel,
        group_name: impl Into<Bytes>,
    ) {
        self.security_to_group
            .insert((security_model, security_name.into()), group_name.into());
    }

    pub fn add_access(&mut self, entry: VacmAccessEntry) {
        self.access_entries.push(entry);
    }

    /// Add or replace a view.
    pub fn add_view(&mut self, name: impl Into<Bytes>, view: View) {
        self.views.insert(name.into(), view);
    }

    pub fn view(&self, name: &[u8]) -> Option<&View> {
        self.views.get(name)
    }

    /// Group for a principal. A mapping under the exact model wins over
    /// one registered for [`SecurityModel::Any`].
    pub fn get_group(&self, model: SecurityModel, name: &[u8]) -> Option<&Bytes> {
        let name = Bytes::copy_from_slice(name);
        self.security_to_group
            .get(&(model, name.clone()))
            .or_else(|| self.security_to_group.get(&(SecurityModel::Any, name)))
    }

    /// Best access entry for a group and context, or `None`.
    pub fn get_access(
        &self,
        group: &[u8],
        context: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
    ) -> Option<&VacmAccessEntry> {
        self.select_access(group, context, model, level).ok()
    }

    fn select_access(
        &self,
        group: &[u8],
        context: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
    ) -> Result<&VacmAccessEntry, AccessDenied> {
        let mut any_applicable = false;
        let best = self
            .access_entries
            .iter()
            .filter(|e| e.applies_to(group, context, model))
            .inspect(|_| any_applicable = true)
            .filter(|e| level >= e.security_level)
            .max_by_key(|e| e.preference(model));

        match best {
            Some(entry) => Ok(entry),
            None if any_applicable => Err(AccessDenied::InsufficientLevel),
            None => Err(AccessDenied::NoAccessEntry),
        }
    }

    /// Resolve the access entry and view name for a principal without
    /// evaluating any OID.
    pub fn resolve_view(
        &self,
        security_name: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
        context: &[u8],
        view_type: ViewType,
    ) -> Result<(&Bytes, &View), AccessDenied> {
        let group = self
            .get_group(model, security_name)
            .ok_or(AccessDenied::NoSuchGroup)?;
        let entry = self.select_access(group, context, model, level)?;
        let name = entry.view(view_type);
        if name.is_empty() {
            return Err(AccessDenied::NoSuchView);
        }
        let view = self.views.get(name).ok_or(AccessDenied::NoSuchView)?;
        Ok((name, view))
    }

    /// Decide whether `security_name` may perform `view_type` on `oid`.
    ///
    /// Returns the name of the permitting view. The result depends only on
    /// the arguments and the current tables.
    pub fn check(
        &self,
        security_name: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
        context: &[u8],
        oid: &Oid,
        view_type: ViewType,
    ) -> Result<Bytes, AccessDenied> {
        let (name, view) = self.resolve_view(security_name, model, level, context, view_type)?;
        if view.contains(oid) {
            Ok(name.clone())
        } else {
            Err(AccessDenied::NotInView)
        }
    }

    pub fn snapshot(&self) -> VacmSnapshot {
        let mut groups: Vec<GroupEntry> = self
            .security_to_group
            .iter()
            .map(|((model, name), group)| GroupEntry {
                security_model: *model,
                security_name: name.clone(),
                group_name: group.clone(),
            })
            .collect();
        groups.sort_by(|a, b| {
            (a.security_name.as_ref(), a.security_model as u8)
                .cmp(&(b.security_name.as_ref(), b.security_model as u8))
        });

        let mut views: Vec<NamedView> = self
            .views
            .iter()
            .map(|(name, view)| NamedView {
                name: name.clone(),
                view: view.clone(),
            })
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));

        VacmSnapshot {
            groups,
            access: self.access_entries.clone(),
            views,
        }
    }

    pub fn from_snapshot(snapshot: VacmSnapshot) -> Self {
        let mut config = Self::new();
        for group in snapshot.groups {
            config.add_group(group.security_name, group.security_model, group.group_name);
        }
        for entry in snapshot.access {
            config.add_access(entry);
        }
        for named in snapshot.views {
            config.add_view(named.name, named.view);
        }
        config
    }
}

/// Builder for [`VacmConfig`].
///
/// ```rust
/// use async_snmp_agent::agent::{SecurityModel, VacmBuilder};
/// use async_snmp_agent::message::SecurityLevel;
/// use async_snmp_agent::oid;
///
/// let vacm = VacmBuilder::new()
///     .group("operator", SecurityModel::V2c, "operators")
///     .group("admin", SecurityModel::Usm, "admins")
///     .access("operators", |a| a.read_view("vendor"))
///     .access("admins", |a| a
///         .security_model(SecurityModel::Usm)
///         .security_level(SecurityLevel::AuthPriv)
///         .read_view("all")
///         .write_view("vendor")
///         .notify_view("all"))
///     .view("vendor", |v| v.include(oid!(1, 3, 6, 1, 4, 1, 21703)))
///     .view("all", |v| v.include(oid!(1, 3, 6, 1)))
///     .build();
///
/// assert!(vacm.get_group(SecurityModel::Usm, b"admin").is_some());
/// ```
#[derive(Debug, Default)]
pub struct VacmBuilder {
    config: VacmConfig,
}

impl VacmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue building on top of existing tables.
    pub fn from_config(config: VacmConfig) -> Self {
        Self { config }
    }

    /// Map a security name to a group. For v1/v2c the security name is the
    /// one the community table resolved, not the community itself.
    pub fn group(
        mut self,
        security_name: impl Into<Bytes>,
        security_model: SecurityModel,
        group_name: impl Into<Bytes>,
    ) -> Self {
        self.config
            .add_group(security_name, security_model, group_name);
        self
    }

    pub fn access<F>(mut self, group_name: impl Into<Bytes>, configure: F) -> Self
    where
        F: FnOnce(AccessEntryBuilder) -> AccessEntryBuilder,
    {
        let entry = configure(AccessEntryBuilder::new(group_name)).build();
        self.config.add_access(entry);
        self
    }

    pub fn view<F>(mut self, name: impl Into<Bytes>, configure: F) -> Self
    where
        F: FnOnce(View) -> View,
    {
        self.config.add_view(name, configure(View::new()));
        self
    }

    pub fn build(self) -> VacmConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn vendor() -> Oid {
        oid!(1, 3, 6, 1, 4, 1, 21703)
    }

    fn entry(
        prefix: &'static [u8],
        model: SecurityModel,
        level: SecurityLevel,
        context_match: ContextMatch,
        read_view: &'static [u8],
    ) -> VacmAccessEntry {
        VacmAccessEntry {
            group_name: Bytes::from_static(b"g"),
            context_prefix: Bytes::from_static(prefix),
            security_model: model,
            security_level: level,
            context_match,
            read_view: Bytes::from_static(read_view),
            write_view: Bytes::new(),
            notify_view: Bytes::new(),
        }
    }

    fn chosen(config: &VacmConfig, context: &[u8], level: SecurityLevel) -> Bytes {
        config
            .get_access(b"g", context, SecurityModel::V2c, level)
            .map(|e| e.read_view.clone())
            .unwrap_or_default()
    }

    fn bootstrap() -> VacmConfig {
        VacmBuilder::new()
            .group("notConfigUser", SecurityModel::V1, "notConfigGroup")
            .group("notConfigUser", SecurityModel::V2c, "notConfigGroup")
            .access("notConfigGroup", |a| a.read_view("systemview"))
            .view("systemview", |v| v.include(oid!(1, 3, 6, 1, 4, 1, 21703, 7500)))
            .build()
    }

    #[test]
    fn test_view_plain_subtree() {
        let view = View::new().include(vendor());
        assert!(view.contains(&vendor()));
        assert!(view.contains(&vendor().join(&[7500, 3, 1, 8, 0])));
        assert!(!view.contains(&oid!(1, 3, 6, 1, 4, 1)));
        assert!(!view.contains(&oid!(1, 3, 6, 1, 4, 1, 21704)));
        assert!(!View::new().contains(&vendor()));
    }

    #[test]
    fn test_view_exclusion_precedence() {
        let view = View::new()
            .include(vendor())
            .exclude(vendor().child(9));

        assert!(view.contains(&vendor().join(&[7500, 3, 1, 8, 0])));
        assert!(!view.contains(&vendor().child(9)));
        assert!(!view.contains(&vendor().join(&[9, 1, 0])));
    }

    #[test]
    fn test_view_longest_family_wins() {
        let view = View::new()
            .exclude(vendor())
            .include(vendor().child(7500));
        assert!(view.contains(&vendor().join(&[7500, 1])));
        assert!(!view.contains(&vendor().join(&[7501, 1])));
    }

    #[test]
    fn test_view_equal_length_exclusion_wins() {
        let included_first = View::new().include(vendor()).exclude(vendor());
        let excluded_first = View::new().exclude(vendor()).include(vendor());
        assert!(!included_first.contains(&vendor().child(1)));
        assert!(!excluded_first.contains(&vendor().child(1)));
    }

    #[test]
    fn test_view_subtree_mask() {
        // Arc 9 (the column) is a wildcard, everything else must match
        let family = ViewSubtree {
            oid: vendor().join(&[7500, 3, 1]),
            mask: vec![0xFF, 0xBF],
            included: true,
        };
        assert!(family.matches(&vendor().join(&[7500, 3, 1, 8, 0])));
        assert!(family.matches(&vendor().join(&[7500, 3, 2, 10, 0])));
        assert!(!family.matches(&vendor().join(&[7501, 3, 1, 8, 0])));
        assert!(!family.matches(&vendor().join(&[7500, 3])));
    }

    #[test]
    fn test_may_contain_under() {
        let view = View::new().include(vendor().child(7500));
        assert!(view.may_contain_under(&oid!(1, 3, 6, 1)));
        assert!(view.may_contain_under(&vendor().join(&[7500, 3])));
        assert!(!view.may_contain_under(&vendor().child(7501)));

        // A wildcard arc inside the root still admits the family
        let masked = View::new().include_masked(vendor().join(&[7500, 3, 1, 8]), vec![0xFF, 0xBF]);
        assert!(masked.may_contain_under(&vendor().join(&[7500, 3, 2])));
        assert!(!masked.may_contain_under(&vendor().join(&[7500, 4])));
    }

    #[test]
    fn test_group_lookup_prefers_exact_model() {
        let mut config = VacmConfig::new();
        config.add_group("user", SecurityModel::Any, "anyGroup");
        config.add_group("user", SecurityModel::V2c, "v2Group");

        assert_eq!(
            config.get_group(SecurityModel::V2c, b"user").unwrap().as_ref(),
            b"v2Group"
        );
        assert_eq!(
            config.get_group(SecurityModel::V1, b"user").unwrap().as_ref(),
            b"anyGroup"
        );
        assert!(config.get_group(SecurityModel::V1, b"nobody").is_none());
    }

    #[test]
    fn test_check_permits_bootstrap_read() {
        let vacm = bootstrap();
        for model in [SecurityModel::V1, SecurityModel::V2c] {
            let view = vacm
                .check(
                    b"notConfigUser",
                    model,
                    SecurityLevel::NoAuthNoPriv,
                    b"",
                    &vendor().join(&[7500, 3, 2, 10, 0]),
                    ViewType::Read,
                )
                .unwrap();
            assert_eq!(view.as_ref(), b"systemview");
        }
    }

    #[test]
    fn test_check_denial_reasons() {
        let vacm = VacmBuilder::from_config(bootstrap())
            .group("secure", SecurityModel::Usm, "secureGroup")
            .access("secureGroup", |a| {
                a.security_level(SecurityLevel::AuthPriv).read_view("systemview")
            })
            .group("dangling", SecurityModel::V2c, "danglingGroup")
            .access("danglingGroup", |a| a.read_view("missing"))
            .build();
        let inside = vendor().join(&[7500, 3, 1, 8, 0]);
        let check = |name: &[u8], model, level, ctx: &[u8], oid: &Oid, vt| {
            vacm.check(name, model, level, ctx, oid, vt)
        };
        let noauth = SecurityLevel::NoAuthNoPriv;

        assert_eq!(
            check(b"stranger", SecurityModel::V2c, noauth, b"", &inside, ViewType::Read),
            Err(AccessDenied::NoSuchGroup)
        );
        // Group exists, but only for v1/v2c
        assert_eq!(
            check(b"notConfigUser", SecurityModel::Usm, noauth, b"", &inside, ViewType::Read),
            Err(AccessDenied::NoSuchGroup)
        );
        assert_eq!(
            check(b"notConfigUser", SecurityModel::V2c, noauth, b"public", &inside, ViewType::Read),
            Err(AccessDenied::NoAccessEntry)
        );
        assert_eq!(
            check(b"notConfigUser", SecurityModel::V2c, noauth, b"", &inside, ViewType::Write),
            Err(AccessDenied::NoSuchView)
        );
        assert_eq!(
            check(b"dangling", SecurityModel::V2c, noauth, b"", &inside, ViewType::Read),
            Err(AccessDenied::NoSuchView)
        );
        assert_eq!(
            check(b"notConfigUser", SecurityModel::V2c, noauth, b"", &oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ViewType::Read),
            Err(AccessDenied::NotInView)
        );
        assert_eq!(
            check(b"secure", SecurityModel::Usm, SecurityLevel::AuthNoPriv, b"", &inside, ViewType::Read),
            Err(AccessDenied::InsufficientLevel)
        );
        assert!(
            check(b"secure", SecurityModel::Usm, SecurityLevel::AuthPriv, b"", &inside, ViewType::Read)
                .is_ok()
        );
    }

    #[test]
    fn test_access_prefers_specific_model() {
        let mut config = VacmConfig::new();
        config.add_access(entry(b"", SecurityModel::Any, SecurityLevel::NoAuthNoPriv, ContextMatch::Exact, b"any"));
        config.add_access(entry(b"", SecurityModel::V2c, SecurityLevel::NoAuthNoPriv, ContextMatch::Exact, b"v2c"));
        assert_eq!(chosen(&config, b"", SecurityLevel::NoAuthNoPriv).as_ref(), b"v2c");
    }

    #[test]
    fn test_access_prefers_exact_match_in_either_order() {
        for exact_first in [true, false] {
            let exact = entry(b"ctx", SecurityModel::Any, SecurityLevel::NoAuthNoPriv, ContextMatch::Exact, b"exact");
            let prefix = entry(b"ctx", SecurityModel::Any, SecurityLevel::NoAuthNoPriv, ContextMatch::Prefix, b"prefix");
            let mut config = VacmConfig::new();
            if exact_first {
                config.add_access(exact);
                config.add_access(prefix);
            } else {
                config.add_access(prefix);
                config.add_access(exact);
            }
            assert_eq!(chosen(&config, b"ctx", SecurityLevel::NoAuthNoPriv).as_ref(), b"exact");
        }
    }

    #[test]
    fn test_access_prefers_longer_prefix_over_level() {
        let mut config = VacmConfig::new();
        config.add_access(entry(b"ctx", SecurityModel::Any, SecurityLevel::AuthPriv, ContextMatch::Prefix, b"short"));
        config.add_access(entry(b"ctx_lab", SecurityModel::Any, SecurityLevel::NoAuthNoPriv, ContextMatch::Prefix, b"long"));
        assert_eq!(chosen(&config, b"ctx_lab_1", SecurityLevel::AuthPriv).as_ref(), b"long");
        assert_eq!(chosen(&config, b"ctx_other", SecurityLevel::AuthPriv).as_ref(), b"short");
    }

    #[test]
    fn test_access_prefers_higher_level_last() {
        let mut config = VacmConfig::new();
        config.add_access(entry(b"", SecurityModel::Any, SecurityLevel::AuthPriv, ContextMatch::Exact, b"authpriv"));
        config.add_access(entry(b"", SecurityModel::Any, SecurityLevel::NoAuthNoPriv, ContextMatch::Exact, b"noauth"));
        config.add_access(entry(b"", SecurityModel::Any, SecurityLevel::AuthNoPriv, ContextMatch::Exact, b"auth"));

        assert_eq!(chosen(&config, b"", SecurityLevel::AuthPriv).as_ref(), b"authpriv");
        assert_eq!(chosen(&config, b"", SecurityLevel::AuthNoPriv).as_ref(), b"auth");
        assert_eq!(chosen(&config, b"", SecurityLevel::NoAuthNoPriv).as_ref(), b"noauth");
    }

    #[test]
    fn test_access_model_outranks_everything() {
        let mut config = VacmConfig::new();
        config.add_access(entry(b"ctx", SecurityModel::Any, SecurityLevel::AuthPriv, ContextMatch::Exact, b"any"));
        config.add_access(entry(b"c", SecurityModel::V2c, SecurityLevel::NoAuthNoPriv, ContextMatch::Prefix, b"v2c"));
        assert_eq!(chosen(&config, b"ctx", SecurityLevel::AuthPriv).as_ref(), b"v2c");
    }

    #[test]
    fn test_check_is_repeatable() {
        let vacm = bootstrap();
        let oid = vendor().join(&[7500, 3, 1, 8, 0]);
        let first = vacm.check(b"notConfigUser", SecurityModel::V1, SecurityLevel::NoAuthNoPriv, b"", &oid, ViewType::Notify);
        let second = vacm.check(b"notConfigUser", SecurityModel::V1, SecurityLevel::NoAuthNoPriv, b"", &oid, ViewType::Notify);
        assert_eq!(first, second);
        assert_eq!(first, Err(AccessDenied::NoSuchView));
    }

    #[test]
    fn test_snapshot_roundtrip_through_json() {
        let vacm = VacmBuilder::from_config(bootstrap())
            .view("masked", |v| v.include_masked(vendor(), vec![0xFE]).exclude(vendor().child(9)))
            .build();
        let snapshot = vacm.snapshot();
        assert_eq!(snapshot.groups.len(), 2);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"1.3.6.1.4.1.21703.7500\""));
        let restored: VacmSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);

        let rebuilt = VacmConfig::from_snapshot(restored);
        assert_eq!(rebuilt.snapshot(), snapshot);
        assert_eq!(rebuilt.view(b"masked"), vacm.view(b"masked"));
    }

    #[test]
    fn test_snapshot_ordering() {
        let vacm = VacmBuilder::new()
            .group("zed", SecurityModel::V2c, "g")
            .group("amy", SecurityModel::V2c, "g")
            .group("amy", SecurityModel::V1, "g")
            .access("second", |a| a.read_view("b"))
            .access("first", |a| a.read_view("a"))
            .view("b", |v| v.include(vendor()))
            .view("a", |v| v.include(vendor()))
            .build();
        let snapshot = vacm.snapshot();

        let names: Vec<_> = snapshot.groups.iter().map(|g| g.security_name.clone()).collect();
        assert_eq!(names, ["amy", "amy", "zed"]);
        let views: Vec<_> = snapshot.views.iter().map(|v| v.name.clone()).collect();
        assert_eq!(views, ["a", "b"]);
        let access: Vec<_> = snapshot.access.iter().map(|a| a.group_name.clone()).collect();
        assert_eq!(access, ["second", "first"]);
    }
}
