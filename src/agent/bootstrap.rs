//! Example configuration of the lab agent.
//!
//! Plain init functions that build the community table and VACM content and
//! register the custom MIB objects. [`AgentBuilder`](super::AgentBuilder)
//! applies them through [`AgentBuilder::bootstrap`](super::AgentBuilder::bootstrap),
//! and the tests reuse them as fixtures.
//!
//! The access granted here (noAuthNoPriv read access for v1 and v2c) suits a
//! demo agent. Production deployments should supply their own tables.

use crate::error::RegistrationError;
use crate::handler::ManagedObjectFactory;
use crate::message::SecurityLevel;
use crate::oid::Oid;

use super::community::{CommunityEntry, CommunityTable, StorageType};
use super::store::ManagedObjectStore;
use super::vacm::{SecurityModel, VacmBuilder, VacmConfig};

/// Vendor subtree covered by `systemview`.
pub const VENDOR_ROOT: &[u32] = &[1, 3, 6, 1, 4, 1, 21703, 7500];

pub const SECURITY_NAME: &str = "notConfigUser";
pub const GROUP_NAME: &str = "notConfigGroup";
pub const READ_VIEW: &str = "systemview";

fn vendor(suffix: &[u32]) -> Oid {
    Oid::from_slice(VENDOR_ROOT).join(suffix)
}

/// Software version scalar, `...7500.3.1.8.0`.
pub fn version_oid() -> Oid {
    vendor(&[3, 1, 8, 0])
}

/// Watermark scalar, `...7500.3.2.10.0`.
pub fn watermark_oid() -> Oid {
    vendor(&[3, 2, 10, 0])
}

/// Community `private` mapped to `notConfigUser` in the default context.
pub fn community_table() -> CommunityTable {
    let mut table = CommunityTable::new();
    table.add(
        CommunityEntry::new("private", SECURITY_NAME, "")
            .storage(StorageType::NonVolatile)
            .active(true),
    );
    table
}

/// `notConfigUser` in `notConfigGroup` for v1 and v2c, reading `systemview`.
pub fn vacm() -> VacmConfig {
    VacmBuilder::new()
        .group(SECURITY_NAME, SecurityModel::V1, GROUP_NAME)
        .group(SECURITY_NAME, SecurityModel::V2c, GROUP_NAME)
        .access(GROUP_NAME, |a| {
            a.context_prefix("")
                .security_model(SecurityModel::Any)
                .security_level(SecurityLevel::NoAuthNoPriv)
                .read_view(READ_VIEW)
        })
        .view(READ_VIEW, |v| v.include(Oid::from_slice(VENDOR_ROOT)))
        .build()
}

/// Register the custom MIB scalars and add the `public` context.
pub fn register_managed_objects(store: &ManagedObjectStore) -> Result<(), RegistrationError> {
    store.add_context("public");
    store.register(ManagedObjectFactory::read_only(version_oid(), "1"), b"")?;
    store.register(ManagedObjectFactory::read_only(watermark_oid(), "120"), b"")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::vacm::ViewType;
    use crate::handler::ManagedObject;

    #[test]
    fn test_community_private_resolves() {
        let resolved = community_table().resolve(b"private", None).unwrap();
        assert_eq!(resolved.security_name.as_ref(), b"notConfigUser");
        assert!(resolved.context_name.is_empty());
        assert!(community_table().resolve(b"public", None).is_err());
    }

    #[test]
    fn test_vacm_grants_vendor_subtree_only() {
        let vacm = vacm();
        for model in [SecurityModel::V1, SecurityModel::V2c] {
            assert_eq!(
                vacm.check(
                    b"notConfigUser",
                    model,
                    SecurityLevel::NoAuthNoPriv,
                    b"",
                    &version_oid(),
                    ViewType::Read,
                )
                .unwrap()
                .as_ref(),
                b"systemview"
            );
        }
        assert!(
            vacm.check(
                b"notConfigUser",
                SecurityModel::V2c,
                SecurityLevel::NoAuthNoPriv,
                b"",
                &crate::oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
                ViewType::Read,
            )
            .is_err()
        );
    }

    #[test]
    fn test_register_twice_is_duplicate() {
        let store = ManagedObjectStore::new();
        register_managed_objects(&store).unwrap();
        assert!(store.snapshot().has_context(b"public"));
        assert!(matches!(
            register_managed_objects(&store),
            Err(RegistrationError::DuplicateRegistration { .. })
        ));
        let object = store.lookup(b"", &watermark_oid()).unwrap();
        assert_eq!(object.oid(), &watermark_oid());
    }
}
