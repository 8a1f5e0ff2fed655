use std::sync::Arc;

use aclkit_security::AclPrincipal;
use aclkit_security::permission::READ;
use sea_orm::Condition;
use sea_orm::sea_query::SelectStatement;
use tracing::trace;

use crate::config::{AclConfig, UnmanagedCreatePolicy};
use crate::metadata::{AclEntityMetaData, AclMetaData, MetaDataError, SchemaDecl};
use crate::secure::compiler::Compiler;
use crate::secure::cond::deny_all;
use crate::secure::error::AclError;
use crate::secure::join::Node;

/// Outcome of compiling access rules for one query.
#[derive(Debug, Clone)]
pub enum AclFilter {
    /// A role grants the permission on every row; no filter.
    Grant,
    /// Nothing can match: role precondition failed, no principal, or no
    /// access path exists.
    Deny,
    /// Rows are visible only where the condition holds. The statement has
    /// been given the joins the condition references and `DISTINCT`.
    Restrict(Condition),
}

impl AclFilter {
    #[must_use]
    pub fn is_grant(&self) -> bool {
        matches!(self, Self::Grant)
    }

    #[must_use]
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Lower to a `WHERE` condition: `Grant` is `true`, `Deny` is `false`.
    #[must_use]
    pub fn into_condition(self) -> Condition {
        match self {
            Self::Grant => Condition::all(),
            Self::Deny => deny_all(),
            Self::Restrict(cond) => cond,
        }
    }
}

/// Entity type being queried and the name its table goes by in the
/// statement.
#[derive(Debug, Clone, Copy)]
pub struct QueryTarget<'a> {
    entity: &'a str,
    alias: Option<&'a str>,
}

impl<'a> QueryTarget<'a> {
    /// Query rooted at the entity's own table name.
    #[must_use]
    pub fn new(entity: &'a str) -> Self {
        Self {
            entity,
            alias: None,
        }
    }

    /// Root table is referenced as `alias` (e.g. `FROM documents AS d`).
    #[must_use]
    pub fn aliased(mut self, alias: &'a str) -> Self {
        self.alias = Some(alias);
        self
    }

    #[must_use]
    pub fn entity(&self) -> &'a str {
        self.entity
    }
}

/// Row-level access specification.
///
/// Shared across requests behind an `Arc`; each call takes the principal
/// explicitly and only mutates the statement it is given.
///
/// # Policy
///
/// | Step | Outcome |
/// |------|---------|
/// | a role permission covers the permission | `Grant` |
/// | role conditions exist and none is met | `Deny` |
/// | no principal | `Deny` |
/// | otherwise | OR of self, owner, owner-group, permission-link and parent paths, or `Deny` if there are none |
#[derive(Debug, Clone)]
pub struct AclSpecification {
    meta: Arc<AclMetaData>,
    config: AclConfig,
}

impl AclSpecification {
    #[must_use]
    pub fn new(meta: Arc<AclMetaData>, config: AclConfig) -> Self {
        Self { meta, config }
    }

    /// Build the metadata registry and wrap it.
    ///
    /// # Errors
    /// Returns [`MetaDataError`] if the schema is invalid.
    pub fn from_schema(schema: &SchemaDecl, config: AclConfig) -> Result<Self, MetaDataError> {
        let meta = AclMetaData::build(schema, &config)?;
        Ok(Self::new(Arc::new(meta), config))
    }

    #[must_use]
    pub fn metadata(&self) -> &AclMetaData {
        &self.meta
    }

    #[must_use]
    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    fn entity(&self, entity_type: &str) -> Result<&AclEntityMetaData, AclError> {
        self.meta
            .entity(entity_type)
            .map(|e| &**e)
            .ok_or_else(|| AclError::UnknownEntity(entity_type.to_owned()))
    }

    /// Compile the access filter for `permission` on `target`.
    ///
    /// Joins needed by the filter are appended to `stmt` under `acl_N`
    /// aliases, and `stmt` is made `DISTINCT`. The caller attaches the
    /// returned filter. Compile at most once per statement.
    ///
    /// # Errors
    /// [`AclError::UnknownEntity`] if the target type has no metadata.
    pub fn to_predicate(
        &self,
        stmt: &mut SelectStatement,
        target: &QueryTarget<'_>,
        principal: Option<&AclPrincipal>,
        permission: &str,
    ) -> Result<AclFilter, AclError> {
        let meta = self.entity(target.entity)?;
        let username = principal.map_or("<anonymous>", AclPrincipal::username);

        if meta.has_role_permission(principal, permission) {
            trace!(entity = %meta.name, permission, username, "access granted by role permission");
            return Ok(AclFilter::Grant);
        }
        if !meta.has_role_condition(principal, permission) {
            trace!(entity = %meta.name, permission, username, "access denied by role condition");
            return Ok(AclFilter::Deny);
        }
        let Some(principal) = principal else {
            trace!(entity = %meta.name, permission, "access denied without principal");
            return Ok(AclFilter::Deny);
        };

        stmt.distinct();
        let root = Node {
            meta,
            alias: target.alias.unwrap_or(&meta.table).to_owned(),
        };
        let mut compiler = Compiler::new(
            &self.meta,
            self.config.owner_groups,
            principal.user_id(),
            stmt,
        );
        let compiled = compiler.compile(&root, permission, self.config.max_depth)?;
        Ok(compiled.map_or(AclFilter::Deny, AclFilter::Restrict))
    }

    /// [`Self::to_predicate`] for `read`.
    ///
    /// # Errors
    /// Same as [`Self::to_predicate`].
    pub fn to_read_predicate(
        &self,
        stmt: &mut SelectStatement,
        target: &QueryTarget<'_>,
        principal: Option<&AclPrincipal>,
    ) -> Result<AclFilter, AclError> {
        self.to_predicate(stmt, target, principal, READ)
    }

    /// Whether `principal` may create an instance of `entity_type`.
    ///
    /// Types without metadata follow [`AclConfig::unmanaged_create`].
    #[must_use]
    pub fn can_be_created(&self, entity_type: &str, principal: Option<&AclPrincipal>) -> bool {
        let Some(meta) = self.meta.entity(entity_type) else {
            let allowed = self.config.unmanaged_create == UnmanagedCreatePolicy::Allow;
            trace!(entity = entity_type, allowed, "create check on unmanaged type");
            return allowed;
        };
        let allowed = meta.allows_create(principal);
        trace!(entity = entity_type, allowed, "create check");
        allowed
    }
}
