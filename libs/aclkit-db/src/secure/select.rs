use aclkit_security::AclPrincipal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, Iterable, PaginatorTrait, PrimaryKeyToColumn,
    QueryFilter, QueryOrder, QuerySelect, QueryTrait,
};

use crate::secure::AclEntity;
use crate::secure::error::AclError;
use crate::secure::specification::{AclFilter, AclSpecification, QueryTarget};

/// Typestate marker: access rules have not been applied yet.
/// Cannot execute queries in this state.
#[derive(Debug, Clone, Copy)]
pub struct Unchecked;

/// Typestate marker: access rules for one permission have been applied.
#[derive(Debug, Clone)]
pub struct Checked {
    permission: String,
}

/// A `SeaORM` `Select` that cannot run until access rules are applied.
///
/// # Example
/// ```rust,ignore
/// use aclkit_db::secure::AclEntityExt;
///
/// let docs = document::Entity::find()
///     .acl()                                           // AclSelect<E, Unchecked>
///     .with_permission(&spec, Some(&principal), "read")? // AclSelect<E, Checked>
///     .order_by(document::Column::Id, Order::Asc)
///     .all(&conn)
///     .await?;
/// ```
#[must_use]
#[derive(Clone, Debug)]
pub struct AclSelect<E: EntityTrait, S> {
    inner: sea_orm::Select<E>,
    state: S,
}

/// Extension trait to wrap a `SeaORM` `Select` into an [`AclSelect`].
pub trait AclEntityExt<E: EntityTrait>: Sized {
    /// You must call `.with_permission()` before executing the query.
    fn acl(self) -> AclSelect<E, Unchecked>;
}

impl<E> AclEntityExt<E> for sea_orm::Select<E>
where
    E: EntityTrait,
{
    fn acl(self) -> AclSelect<E, Unchecked> {
        AclSelect {
            inner: self,
            state: Unchecked,
        }
    }
}

/// The single primary-key column of `E`.
///
/// # Errors
/// Returns `AclError::Invalid` for composite keys.
pub fn primary_column<E: EntityTrait>() -> Result<E::Column, AclError> {
    let mut keys = E::PrimaryKey::iter();
    match (keys.next(), keys.next()) {
        (Some(key), None) => Ok(key.into_column()),
        _ => Err(AclError::Invalid(
            "entity must have a single-column primary key",
        )),
    }
}

impl<E> AclSelect<E, Unchecked>
where
    E: AclEntity,
{
    /// Restrict the query to rows `principal` holds `permission` on.
    ///
    /// # Errors
    /// - [`AclError::UnknownEntity`] if `E::ACL_TYPE` has no metadata.
    /// - [`AclError::TableMismatch`] if the metadata names another table.
    pub fn with_permission(
        mut self,
        spec: &AclSpecification,
        principal: Option<&AclPrincipal>,
        permission: &str,
    ) -> Result<AclSelect<E, Checked>, AclError> {
        let meta = spec
            .metadata()
            .entity(E::ACL_TYPE)
            .ok_or_else(|| AclError::UnknownEntity(E::ACL_TYPE.to_owned()))?;
        let table = E::default().table_name().to_owned();
        if meta.table != table {
            return Err(AclError::TableMismatch {
                entity_type: E::ACL_TYPE.to_owned(),
                expected: meta.table.clone(),
                actual: table,
            });
        }

        let filter = spec.to_predicate(
            QueryTrait::query(&mut self.inner),
            &QueryTarget::new(E::ACL_TYPE),
            principal,
            permission,
        )?;
        let inner = match filter {
            AclFilter::Grant => self.inner,
            other => QueryFilter::filter(self.inner, other.into_condition()),
        };

        Ok(AclSelect {
            inner,
            state: Checked {
                permission: permission.to_owned(),
            },
        })
    }
}

impl<E> AclSelect<E, Checked>
where
    E: EntityTrait,
{
    /// The permission the rows were checked for.
    #[must_use]
    pub fn permission(&self) -> &str {
        &self.state.permission
    }

    /// Execute the query and return all matching results.
    ///
    /// # Errors
    /// Returns `AclError::Db` if the database query fails.
    pub async fn all<C: ConnectionTrait>(self, db: &C) -> Result<Vec<E::Model>, AclError> {
        Ok(self.inner.all(db).await?)
    }

    /// Execute the query and return at most one result.
    ///
    /// # Errors
    /// Returns `AclError::Db` if the database query fails.
    pub async fn one<C: ConnectionTrait>(self, db: &C) -> Result<Option<E::Model>, AclError> {
        Ok(self.inner.one(db).await?)
    }

    /// Execute the query and return the number of matching results.
    ///
    /// # Errors
    /// Returns `AclError::Db` if the database query fails.
    pub async fn count<C: ConnectionTrait>(self, db: &C) -> Result<u64, AclError>
    where
        E::Model: sea_orm::FromQueryResult + Send + Sync,
    {
        Ok(self.inner.count(db).await?)
    }

    /// Narrow to a single row by primary key.
    ///
    /// # Errors
    /// Returns `AclError::Invalid` if the entity has a composite key.
    pub fn and_id<V>(self, id: V) -> Result<Self, AclError>
    where
        V: Into<sea_orm::Value>,
    {
        let col = primary_column::<E>()?;
        Ok(self.filter(sea_orm::Condition::all().add(col.eq(id))))
    }

    /// Narrow to rows whose primary key is in `ids`.
    ///
    /// # Errors
    /// Returns `AclError::Invalid` if the entity has a composite key.
    pub fn and_ids<I, V>(self, ids: I) -> Result<Self, AclError>
    where
        I: IntoIterator<Item = V>,
        V: Into<sea_orm::Value>,
    {
        let col = primary_column::<E>()?;
        Ok(self.filter(sea_orm::Condition::all().add(col.is_in(ids))))
    }

    /// Add additional filters. The access conditions remain in place.
    pub fn filter(mut self, filter: sea_orm::Condition) -> Self {
        self.inner = QueryFilter::filter(self.inner, filter);
        self
    }

    pub fn order_by<C>(mut self, col: C, order: sea_orm::Order) -> Self
    where
        C: sea_orm::IntoSimpleExpr,
    {
        self.inner = QueryOrder::order_by(self.inner, col, order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.inner = QuerySelect::limit(self.inner, limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.inner = QuerySelect::offset(self.inner, offset);
        self
    }

    /// Unwrap the inner `SeaORM` `Select` for advanced use cases.
    ///
    /// The caller must not remove the joins or conditions added by
    /// `.with_permission()`.
    #[must_use]
    pub fn into_inner(self) -> sea_orm::Select<E> {
        self.inner
    }
}
