use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use aclkit_security::permission::CREATE;
use aclkit_security::{AclPrincipal, PermissionSet};

use super::RelationKind;

/// A resolved navigable property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub property: String,
    /// Target entity type; always registered.
    pub target: String,
    pub kind: RelationKind,
}

impl Relation {
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.kind.is_collection()
    }
}

/// Direct owner: the relation targets the user entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerData {
    pub relation: Relation,
    pub permissions: PermissionSet,
}

/// Indirect owner: the relation targets an entity that itself has owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerGroupData {
    pub relation: Relation,
    pub permissions: PermissionSet,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentData {
    pub relation: Relation,
    pub prefix: String,
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionLinkData {
    pub relation: Relation,
    pub permission_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRule {
    pub authorities: BTreeSet<String>,
    pub permissions: PermissionSet,
}

impl RoleRule {
    /// True if the principal holds one of the rule's authorities and the
    /// rule covers `permission`. An absent principal holds nothing.
    #[must_use]
    pub fn matches(&self, principal: Option<&AclPrincipal>, permission: &str) -> bool {
        principal.is_some_and(|p| holds_any(p, &self.authorities))
            && self.permissions.has_permission(permission)
    }
}

fn holds_any(principal: &AclPrincipal, authorities: &BTreeSet<String>) -> bool {
    principal.has_any_authority(authorities.iter().map(String::as_str))
}

/// Frozen access rules of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntityMetaData {
    pub name: String,
    pub table: String,
    pub id_column: String,
    pub owners: Vec<OwnerData>,
    pub owner_groups: Vec<OwnerGroupData>,
    pub parents: Vec<ParentData>,
    pub permission_links: Vec<PermissionLinkData>,
    pub role_permissions: Vec<RoleRule>,
    pub role_conditions: Vec<RoleRule>,
    pub create_permissions: Vec<BTreeSet<String>>,
}

impl AclEntityMetaData {
    /// A role grants `permission` on every row of this type.
    #[must_use]
    pub fn has_role_permission(&self, principal: Option<&AclPrincipal>, permission: &str) -> bool {
        self.role_permissions
            .iter()
            .any(|r| r.matches(principal, permission))
    }

    /// Role preconditions hold for `permission`. Vacuously true without
    /// conditions.
    #[must_use]
    pub fn has_role_condition(&self, principal: Option<&AclPrincipal>, permission: &str) -> bool {
        self.role_conditions.is_empty()
            || self
                .role_conditions
                .iter()
                .any(|r| r.matches(principal, permission))
    }

    /// Any create authority set matches, or a role grants `create`.
    #[must_use]
    pub fn allows_create(&self, principal: Option<&AclPrincipal>) -> bool {
        let by_authority = principal.is_some_and(|p| {
            self.create_permissions
                .iter()
                .any(|authorities| holds_any(p, authorities))
        });
        by_authority || self.has_role_permission(principal, CREATE)
    }
}

/// Process-wide registry of entity metadata.
///
/// Built once by [`AclMetaData::build`] and shared behind an `Arc`; there is
/// no way to mutate it afterwards.
#[derive(Debug, Clone)]
pub struct AclMetaData {
    pub(super) entities: HashMap<String, Arc<AclEntityMetaData>>,
    pub(super) user_entity: String,
    pub(super) self_permissions: PermissionSet,
}

impl AclMetaData {
    /// Look up an entity by type identifier.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Arc<AclEntityMetaData>> {
        self.entities.get(name)
    }

    /// Look up an entity by table name.
    #[must_use]
    pub fn entity_by_table(&self, table: &str) -> Option<&Arc<AclEntityMetaData>> {
        self.entities.values().find(|e| e.table == table)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<AclEntityMetaData>> {
        self.entities.values()
    }

    #[must_use]
    pub fn user_entity(&self) -> &str {
        &self.user_entity
    }

    #[must_use]
    pub fn is_user_entity(&self, name: &str) -> bool {
        self.user_entity == name
    }

    #[must_use]
    pub fn self_permissions(&self) -> &PermissionSet {
        &self.self_permissions
    }
}
