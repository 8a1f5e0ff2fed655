use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use aclkit_security::{PermissionError, permission};

use super::model::{
    AclEntityMetaData, AclMetaData, OwnerData, OwnerGroupData, ParentData, PermissionLinkData,
    Relation, RoleRule,
};
use super::schema::{EntityDecl, RelationDecl, RelationKind, RoleRuleDecl, SchemaDecl};
use crate::config::AclConfig;

/// Schema faults detected while building [`AclMetaData`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetaDataError {
    #[error("entity '{0}' is declared more than once")]
    DuplicateEntity(String),

    #[error("entity '{entity}': '{field}' must not be empty")]
    EmptyField {
        entity: String,
        field: &'static str,
    },

    #[error("user entity '{0}' is not declared")]
    UnknownUserEntity(String),

    #[error("entity '{entity}': property '{property}' has no relation")]
    UnknownProperty { entity: String, property: String },

    #[error("entity '{entity}': relation '{property}' targets undeclared entity '{target}'")]
    UnknownTarget {
        entity: String,
        property: String,
        target: String,
    },

    #[error("entity '{entity}': owner group '{property}' targets '{target}' which has no owners")]
    OwnerGroupWithoutOwners {
        entity: String,
        property: String,
        target: String,
    },

    #[error("entity '{entity}': {source}")]
    InvalidPermission {
        entity: String,
        #[source]
        source: PermissionError,
    },
}

impl AclMetaData {
    /// Validate a schema and freeze it into a registry.
    ///
    /// # Errors
    /// Returns the first [`MetaDataError`] found. Nothing is registered on
    /// failure.
    pub fn build(schema: &SchemaDecl, config: &AclConfig) -> Result<Self, MetaDataError> {
        let mut declared: HashMap<&str, &EntityDecl> = HashMap::new();
        for entity in &schema.entities {
            check_not_empty(entity)?;
            if declared.insert(entity.name.as_str(), entity).is_some() {
                return Err(MetaDataError::DuplicateEntity(entity.name.clone()));
            }
        }

        if !declared.contains_key(schema.user_entity.as_str()) {
            return Err(MetaDataError::UnknownUserEntity(schema.user_entity.clone()));
        }
        config
            .self_permissions
            .validate()
            .map_err(|source| MetaDataError::InvalidPermission {
                entity: schema.user_entity.clone(),
                source,
            })?;

        // Entities that can act as owner groups: they have a direct owner.
        let with_owners: HashSet<&str> = schema
            .entities
            .iter()
            .filter(|e| {
                e.owners.iter().any(|o| {
                    e.relations
                        .get(&o.property)
                        .is_some_and(|r| r.target == schema.user_entity)
                })
            })
            .map(|e| e.name.as_str())
            .collect();

        let ctx = BuildContext {
            declared: &declared,
            with_owners: &with_owners,
            user_entity: &schema.user_entity,
        };

        let mut entities = HashMap::with_capacity(schema.entities.len());
        for decl in &schema.entities {
            let meta = ctx.resolve_entity(decl)?;
            entities.insert(decl.name.clone(), Arc::new(meta));
        }

        tracing::debug!(
            entities = entities.len(),
            user_entity = %schema.user_entity,
            "acl metadata built"
        );

        Ok(Self {
            entities,
            user_entity: schema.user_entity.clone(),
            self_permissions: config.self_permissions.clone(),
        })
    }
}

fn check_not_empty(entity: &EntityDecl) -> Result<(), MetaDataError> {
    let fields = [
        ("name", &entity.name),
        ("table", &entity.table),
        ("id_column", &entity.id_column),
    ];
    for (field, value) in fields {
        if value.is_empty() {
            return Err(MetaDataError::EmptyField {
                entity: entity.name.clone(),
                field,
            });
        }
    }
    Ok(())
}

struct BuildContext<'a> {
    declared: &'a HashMap<&'a str, &'a EntityDecl>,
    with_owners: &'a HashSet<&'a str>,
    user_entity: &'a str,
}

impl BuildContext<'_> {
    fn resolve_entity(&self, decl: &EntityDecl) -> Result<AclEntityMetaData, MetaDataError> {
        let relations = self.resolve_relations(decl)?;
        let lookup = |property: &str| -> Result<Relation, MetaDataError> {
            relations
                .get(property)
                .cloned()
                .ok_or_else(|| MetaDataError::UnknownProperty {
                    entity: decl.name.clone(),
                    property: property.to_owned(),
                })
        };
        let invalid = |source: PermissionError| MetaDataError::InvalidPermission {
            entity: decl.name.clone(),
            source,
        };

        let (owners, owner_groups) = self.resolve_owners(decl, &lookup)?;

        let mut parents = Vec::with_capacity(decl.parents.len());
        for parent in &decl.parents {
            let relation = lookup(&parent.property)?;
            parent.permissions.validate().map_err(invalid)?;
            permission::validate_prefix(&parent.prefix).map_err(invalid)?;
            parents.push(ParentData {
                relation,
                prefix: parent.prefix.clone(),
                permissions: parent.permissions.clone(),
            });
        }

        let mut permission_links = Vec::with_capacity(decl.permission_links.len());
        for link in &decl.permission_links {
            let relation = lookup(&link.property)?;
            if link.permission_field.is_empty() {
                return Err(MetaDataError::EmptyField {
                    entity: decl.name.clone(),
                    field: "permission_field",
                });
            }
            if !self.with_owners.contains(relation.target.as_str()) {
                tracing::warn!(
                    entity = %decl.name,
                    property = %link.property,
                    target = %relation.target,
                    "permission link target has no direct owners"
                );
            }
            permission_links.push(PermissionLinkData {
                relation,
                permission_field: link.permission_field.clone(),
            });
        }

        let role_permissions = resolve_roles(&decl.role_permissions).map_err(invalid)?;
        let role_conditions = resolve_roles(&decl.role_conditions).map_err(invalid)?;

        Ok(AclEntityMetaData {
            name: decl.name.clone(),
            table: decl.table.clone(),
            id_column: decl.id_column.clone(),
            owners,
            owner_groups,
            parents,
            permission_links,
            role_permissions,
            role_conditions,
            create_permissions: decl.create_permissions.clone(),
        })
    }

    fn resolve_owners(
        &self,
        decl: &EntityDecl,
        lookup: &impl Fn(&str) -> Result<Relation, MetaDataError>,
    ) -> Result<(Vec<OwnerData>, Vec<OwnerGroupData>), MetaDataError> {
        let invalid = |source: PermissionError| MetaDataError::InvalidPermission {
            entity: decl.name.clone(),
            source,
        };

        let mut owners = Vec::new();
        let mut owner_groups = Vec::new();
        for owner in &decl.owners {
            let relation = lookup(&owner.property)?;
            owner.permissions.validate().map_err(invalid)?;
            permission::validate_prefix(&owner.prefix).map_err(invalid)?;
            if owner.permissions.is_empty() {
                tracing::warn!(
                    entity = %decl.name,
                    property = %owner.property,
                    "owner rule has no permissions and never grants access"
                );
            }

            if relation.target == self.user_entity {
                owners.push(OwnerData {
                    relation,
                    permissions: owner.permissions.clone(),
                });
            } else if self.with_owners.contains(relation.target.as_str()) {
                owner_groups.push(OwnerGroupData {
                    relation,
                    permissions: owner.permissions.clone(),
                    prefix: owner.prefix.clone(),
                });
            } else {
                return Err(MetaDataError::OwnerGroupWithoutOwners {
                    entity: decl.name.clone(),
                    property: owner.property.clone(),
                    target: relation.target,
                });
            }
        }

        Ok((owners, owner_groups))
    }

    fn resolve_relations(
        &self,
        decl: &EntityDecl,
    ) -> Result<BTreeMap<String, Relation>, MetaDataError> {
        decl.relations
            .iter()
            .map(|(property, rel)| {
                self.resolve_relation(decl, property, rel)
                    .map(|r| (property.clone(), r))
            })
            .collect()
    }

    fn resolve_relation(
        &self,
        decl: &EntityDecl,
        property: &str,
        rel: &RelationDecl,
    ) -> Result<Relation, MetaDataError> {
        if !self.declared.contains_key(rel.target.as_str()) {
            return Err(MetaDataError::UnknownTarget {
                entity: decl.name.clone(),
                property: property.to_owned(),
                target: rel.target.clone(),
            });
        }
        let has_empty_column = match &rel.kind {
            RelationKind::BelongsTo { column }
            | RelationKind::HasOne { column }
            | RelationKind::HasMany { column } => column.is_empty(),
            RelationKind::ManyToMany {
                via,
                from_column,
                to_column,
            } => via.is_empty() || from_column.is_empty() || to_column.is_empty(),
        };
        if has_empty_column {
            return Err(MetaDataError::EmptyField {
                entity: decl.name.clone(),
                field: "relation column",
            });
        }
        Ok(Relation {
            property: property.to_owned(),
            target: rel.target.clone(),
            kind: rel.kind.clone(),
        })
    }
}

fn resolve_roles(rules: &[RoleRuleDecl]) -> Result<Vec<RoleRule>, PermissionError> {
    rules
        .iter()
        .map(|r| {
            r.permissions.validate()?;
            Ok(RoleRule {
                authorities: r.authorities.clone(),
                permissions: r.permissions.clone(),
            })
        })
        .collect()
}
