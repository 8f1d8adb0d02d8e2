//! Security Mapping Table (community table).
//!
//! Maps a v1/v2c community string to the security name and context the
//! request is evaluated under, in the spirit of the SNMP-COMMUNITY-MIB
//! `snmpCommunityTable` (RFC 3584). Populated at startup and read-only
//! afterwards.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Storage type of a row (SNMPv2-TC StorageType).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageType {
    Other,
    Volatile,
    #[default]
    NonVolatile,
    Permanent,
    ReadOnly,
}

/// One community table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityEntry {
    #[serde(with = "crate::util::serde_text")]
    pub community: Bytes,
    #[serde(with = "crate::util::serde_text")]
    pub security_name: Bytes,
    #[serde(with = "crate::util::serde_text")]
    pub context_name: Bytes,
    pub storage: StorageType,
    pub active: bool,
}

impl CommunityEntry {
    /// An active, non-volatile row.
    pub fn new(
        community: impl Into<Bytes>,
        security_name: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
    ) -> Self {
        Self {
            community: community.into(),
            security_name: security_name.into(),
            context_name: context_name.into(),
            storage: StorageType::NonVolatile,
            active: true,
        }
    }

    pub fn storage(mut self, storage: StorageType) -> Self {
        self.storage = storage;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Resolved identity of a community.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub security_name: Bytes,
    pub context_name: Bytes,
}

/// The community table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityTable {
    entries: Vec<CommunityEntry>,
}

impl CommunityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row.
    pub fn add(&mut self, entry: CommunityEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Shorthand for adding an active non-volatile row.
    pub fn community(
        &mut self,
        community: impl Into<Bytes>,
        security_name: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
    ) -> &mut Self {
        self.add(CommunityEntry::new(community, security_name, context_name))
    }

    pub fn entries(&self) -> &[CommunityEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a community string.
    ///
    /// Inactive rows are ignored. When several active rows carry the same
    /// community, one whose context equals `context_hint` is preferred,
    /// otherwise the first in insertion order wins.
    pub fn resolve(&self, community: &[u8], context_hint: Option<&[u8]>) -> Result<Resolved> {
        let mut candidates = self
            .entries
            .iter()
            .filter(|e| e.active && e.community.as_ref() == community);

        let first = candidates.next().ok_or_else(|| Error::UnknownSecurityIdentity {
            name: Bytes::copy_from_slice(community),
        })?;

        let chosen = match context_hint {
            Some(hint) if first.context_name.as_ref() != hint => candidates
                .find(|e| e.context_name.as_ref() == hint)
                .unwrap_or(first),
            _ => first,
        };

        Ok(Resolved {
            security_name: chosen.security_name.clone(),
            context_name: chosen.context_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CommunityTable {
        let mut table = CommunityTable::new();
        table.community("private", "notConfigUser", "");
        table
    }

    #[test]
    fn test_resolve_known_community() {
        let resolved = table().resolve(b"private", None).unwrap();
        assert_eq!(resolved.security_name.as_ref(), b"notConfigUser");
        assert_eq!(resolved.context_name.as_ref(), b"");
    }

    #[test]
    fn test_resolve_unknown_community() {
        let err = table().resolve(b"public", None).unwrap_err();
        match err {
            Error::UnknownSecurityIdentity { name } => assert_eq!(name.as_ref(), b"public"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_inactive_rows_ignored() {
        let mut table = CommunityTable::new();
        table.add(CommunityEntry::new("private", "notConfigUser", "").active(false));
        assert!(table.resolve(b"private", None).is_err());
    }

    #[test]
    fn test_context_hint_preference() {
        let mut table = table();
        table.community("private", "publicUser", "public");

        let default = table.resolve(b"private", None).unwrap();
        assert_eq!(default.security_name.as_ref(), b"notConfigUser");

        let hinted = table.resolve(b"private", Some(b"public")).unwrap();
        assert_eq!(hinted.security_name.as_ref(), b"publicUser");

        let unmatched = table.resolve(b"private", Some(b"other")).unwrap();
        assert_eq!(unmatched.security_name.as_ref(), b"notConfigUser");
    }

    #[test]
    fn test_serde_roundtrip_is_readable() {
        let json = serde_json::to_string(&table()).unwrap();
        assert!(json.contains("\"notConfigUser\""));
        let back: CommunityTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table());
    }
}
