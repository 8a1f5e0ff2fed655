//! Declarative entity schema.
//!
//! This is the deserializable input to [`AclMetaData::build`]. Nothing here
//! is validated; see the builder for the rules.
//!
//! [`AclMetaData::build`]: super::AclMetaData::build

use std::collections::{BTreeMap, BTreeSet};

use aclkit_security::PermissionSet;
use aclkit_security::permission::{DELETE, READ, UPDATE};
use serde::{Deserialize, Serialize};

/// The full schema: every ACL-managed entity plus the principal's entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDecl {
    /// Entity type whose rows are principals.
    pub user_entity: String,
    #[serde(default)]
    pub entities: Vec<EntityDecl>,
}

impl SchemaDecl {
    #[must_use]
    pub fn new(user_entity: &str) -> Self {
        Self {
            user_entity: user_entity.to_owned(),
            entities: Vec::new(),
        }
    }

    #[must_use]
    pub fn entity(mut self, entity: EntityDecl) -> Self {
        self.entities.push(entity);
        self
    }
}

/// One entity type and its access rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDecl {
    /// Type identifier used by rules and lookups.
    pub name: String,
    pub table: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Named navigable properties, referenced by the rules below.
    #[serde(default)]
    pub relations: BTreeMap<String, RelationDecl>,

    /// Owner rules. A rule whose relation targets the user entity is a
    /// direct owner; any other target makes it an owner group.
    #[serde(default)]
    pub owners: Vec<OwnerDecl>,
    #[serde(default)]
    pub parents: Vec<ParentDecl>,
    #[serde(default)]
    pub permission_links: Vec<PermissionLinkDecl>,

    #[serde(default)]
    pub role_permissions: Vec<RoleRuleDecl>,
    #[serde(default)]
    pub role_conditions: Vec<RoleRuleDecl>,

    /// Authority sets, each sufficient on its own to create an instance.
    #[serde(default)]
    pub create_permissions: Vec<BTreeSet<String>>,
}

fn default_id_column() -> String {
    "id".to_owned()
}

/// How a property navigates from the declaring entity to its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDecl {
    /// Target entity type.
    pub target: String,
    #[serde(flatten)]
    pub kind: RelationKind,
}

/// Join shape of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationKind {
    /// `source.column = target.id`
    BelongsTo { column: String },
    /// `target.column = source.id`, at most one target row.
    HasOne { column: String },
    /// `target.column = source.id`
    HasMany { column: String },
    /// `via.from_column = source.id AND via.to_column = target.id`
    ManyToMany {
        via: String,
        from_column: String,
        to_column: String,
    },
}

impl RelationKind {
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::HasMany { .. } | Self::ManyToMany { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OwnerDecl {
    pub property: String,
    #[serde(default = "default_owner_permissions")]
    pub permissions: PermissionSet,
    /// Re-scopes the permission before checking the group entity's owners.
    /// Only meaningful for owner groups in scoped mode.
    #[serde(default)]
    pub prefix: String,
}

/// Owners may read, update and delete unless declared otherwise.
#[must_use]
pub fn default_owner_permissions() -> PermissionSet {
    PermissionSet::new([READ, UPDATE, DELETE])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParentDecl {
    pub property: String,
    /// Scope added to the permission when it is checked on the parent.
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "PermissionSet::all")]
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionLinkDecl {
    pub property: String,
    /// Column on the link entity holding the granted permission token.
    #[serde(default = "default_permission_field")]
    pub permission_field: String,
}

fn default_permission_field() -> String {
    "permission".to_owned()
}

/// Authorities paired with the permissions they grant (role permission) or
/// require (role condition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleRuleDecl {
    pub authorities: BTreeSet<String>,
    #[serde(default = "PermissionSet::all")]
    pub permissions: PermissionSet,
}

impl RoleRuleDecl {
    #[must_use]
    pub fn new<A, P>(authorities: A, permissions: P) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            authorities: authorities.into_iter().map(Into::into).collect(),
            permissions: PermissionSet::new(permissions),
        }
    }
}

impl EntityDecl {
    #[must_use]
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_owned(),
            table: table.to_owned(),
            id_column: default_id_column(),
            relations: BTreeMap::new(),
            owners: Vec::new(),
            parents: Vec::new(),
            permission_links: Vec::new(),
            role_permissions: Vec::new(),
            role_conditions: Vec::new(),
            create_permissions: Vec::new(),
        }
    }

    #[must_use]
    pub fn id_column(mut self, column: &str) -> Self {
        column.clone_into(&mut self.id_column);
        self
    }

    #[must_use]
    pub fn relation(mut self, property: &str, target: &str, kind: RelationKind) -> Self {
        self.relations.insert(
            property.to_owned(),
            RelationDecl {
                target: target.to_owned(),
                kind,
            },
        );
        self
    }

    #[must_use]
    pub fn belongs_to(self, property: &str, target: &str, column: &str) -> Self {
        self.relation(
            property,
            target,
            RelationKind::BelongsTo {
                column: column.to_owned(),
            },
        )
    }

    #[must_use]
    pub fn has_one(self, property: &str, target: &str, column: &str) -> Self {
        self.relation(
            property,
            target,
            RelationKind::HasOne {
                column: column.to_owned(),
            },
        )
    }

    #[must_use]
    pub fn has_many(self, property: &str, target: &str, column: &str) -> Self {
        self.relation(
            property,
            target,
            RelationKind::HasMany {
                column: column.to_owned(),
            },
        )
    }

    #[must_use]
    pub fn many_to_many(
        self,
        property: &str,
        target: &str,
        via: &str,
        from_column: &str,
        to_column: &str,
    ) -> Self {
        self.relation(
            property,
            target,
            RelationKind::ManyToMany {
                via: via.to_owned(),
                from_column: from_column.to_owned(),
                to_column: to_column.to_owned(),
            },
        )
    }

    /// Owner rule with the default `{read, update, delete}` permissions.
    #[must_use]
    pub fn owner(self, property: &str) -> Self {
        self.owner_with(property, default_owner_permissions())
    }

    #[must_use]
    pub fn owner_with(mut self, property: &str, permissions: PermissionSet) -> Self {
        self.owners.push(OwnerDecl {
            property: property.to_owned(),
            permissions,
            prefix: String::new(),
        });
        self
    }

    #[must_use]
    pub fn parent(mut self, property: &str, prefix: &str, permissions: PermissionSet) -> Self {
        self.parents.push(ParentDecl {
            property: property.to_owned(),
            prefix: prefix.to_owned(),
            permissions,
        });
        self
    }

    #[must_use]
    pub fn permission_link(mut self, property: &str, permission_field: &str) -> Self {
        self.permission_links.push(PermissionLinkDecl {
            property: property.to_owned(),
            permission_field: permission_field.to_owned(),
        });
        self
    }

    #[must_use]
    pub fn role_permission(mut self, rule: RoleRuleDecl) -> Self {
        self.role_permissions.push(rule);
        self
    }

    #[must_use]
    pub fn role_condition(mut self, rule: RoleRuleDecl) -> Self {
        self.role_conditions.push(rule);
        self
    }

    #[must_use]
    pub fn create_permission<I>(mut self, authorities: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.create_permissions
            .push(authorities.into_iter().map(Into::into).collect());
        self
    }
}
