//! Compiler configuration and the figment loaders for it.
//!
//! A single YAML document carries both the compiler knobs (under `acl`) and
//! the entity schema (under `schema`):
//!
//! ```yaml
//! acl:
//!   max_depth: 3
//!   unmanaged_create: deny
//! schema:
//!   user_entity: user
//!   entities:
//!     - name: user
//!       table: users
//! ```
//!
//! Every key can be overridden from the environment with the `ACLKIT_`
//! prefix and `__` as the nesting separator, e.g.
//! `ACLKIT_ACL__MAX_DEPTH=4`.

use std::path::Path;

use aclkit_security::PermissionSet;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::metadata::SchemaDecl;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "ACLKIT_";

const ACL_KEY: &str = "acl";
const SCHEMA_KEY: &str = "schema";

/// Predicate compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AclConfig {
    /// Maximum number of parent hops followed when compiling a predicate.
    /// Zero disables parent inheritance entirely.
    pub max_depth: u32,

    /// Permissions a principal holds on its own row of the user entity.
    pub self_permissions: PermissionSet,

    /// Create rule for entity types the schema does not declare.
    pub unmanaged_create: UnmanagedCreatePolicy,

    /// How owners of an owner-group entity are admitted.
    pub owner_groups: OwnerGroupMode,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            self_permissions: PermissionSet::all(),
            unmanaged_create: UnmanagedCreatePolicy::Allow,
            owner_groups: OwnerGroupMode::Unconditional,
        }
    }
}

/// Create rule for types without metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmanagedCreatePolicy {
    /// Entities the schema does not know about may always be created.
    #[default]
    Allow,
    /// Creating an undeclared entity type is refused.
    Deny,
}

/// Owner-group admission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerGroupMode {
    /// Once the group relation covers the permission, every owner of the
    /// group entity is admitted regardless of its own permission set.
    #[default]
    Unconditional,
    /// The group entity's owner relation must also cover the permission,
    /// re-scoped by the group's prefix.
    Scoped,
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load aclkit configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

/// Compiler configuration plus the entity schema, as loaded from one source.
#[derive(Debug, Clone)]
pub struct AclSettings {
    pub acl: AclConfig,
    pub schema: SchemaDecl,
}

impl AclSettings {
    /// Load settings from a YAML file with environment overrides.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read, is malformed, or
    /// has no `schema` section.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading aclkit settings");
        Self::extract(&base_figment().merge(Yaml::file(path)))
    }

    /// Load settings from an in-memory YAML document with environment
    /// overrides.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the document is malformed or has no
    /// `schema` section.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::extract(&base_figment().merge(Yaml::string(yaml)))
    }

    fn extract(figment: &Figment) -> Result<Self, ConfigError> {
        let figment = figment.clone().merge(Env::prefixed(ENV_PREFIX).split("__"));
        let acl: AclConfig = figment.extract_inner(ACL_KEY)?;
        let schema: SchemaDecl = figment.extract_inner(SCHEMA_KEY)?;
        tracing::debug!(
            max_depth = acl.max_depth,
            entities = schema.entities.len(),
            "aclkit settings loaded"
        );
        Ok(Self { acl, schema })
    }
}

fn base_figment() -> Figment {
    Figment::from(Serialized::default(ACL_KEY, AclConfig::default()))
}
