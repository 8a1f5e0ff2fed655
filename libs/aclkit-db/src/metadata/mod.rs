//! Entity access metadata.
//!
//! The schema ([`SchemaDecl`]) is plain data, usually deserialized from the
//! `schema` section of the settings file. [`AclMetaData::build`] validates it
//! once at startup and produces a read-only registry that the predicate
//! compiler walks for every query.
//!
//! | Rule | Declared as | Meaning |
//! |------|-------------|---------|
//! | owner | `owners` entry targeting the user entity | the referenced user may act on the row |
//! | owner group | `owners` entry targeting another entity | owners of the referenced entity may act on the row |
//! | parent | `parents` | permission on the parent (re-scoped by `prefix`) carries over |
//! | permission link | `permission_links` | owners of a link row may act if its permission column grants it |
//! | role permission | `role_permissions` | authority grants the permission on every row |
//! | role condition | `role_conditions` | authority required before any row rule applies |
//! | create permission | `create_permissions` | authority set allowed to create |

mod builder;
mod model;
mod schema;

pub use builder::MetaDataError;
pub use model::{
    AclEntityMetaData, AclMetaData, OwnerData, OwnerGroupData, ParentData, PermissionLinkData,
    Relation, RoleRule,
};
pub use schema::{
    EntityDecl, OwnerDecl, ParentDecl, PermissionLinkDecl, RelationDecl, RelationKind,
    RoleRuleDecl, SchemaDecl, default_owner_permissions,
};
