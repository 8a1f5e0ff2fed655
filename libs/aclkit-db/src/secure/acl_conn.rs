//! Repository boundary: every read and write goes through the access rules.
//!
//! `AclDb` owns the connection and the shared [`AclSpecification`]. Request
//! handlers open an [`AclSession`] for the current principal and use it in
//! place of raw `SeaORM` calls:
//!
//! ```ignore
//! use aclkit_db::secure::AclDb;
//! use aclkit_security::permission::{READ, UPDATE};
//!
//! let session = db.session(Some(&principal));
//!
//! let visible = session.find_all::<document::Entity>(READ).await?;
//! let doc = session.get_one::<document::Entity, _>(42_i64, UPDATE).await?;
//!
//! let mut am: document::ActiveModel = doc.into();
//! am.title = Set("renamed".to_owned());
//! session.update::<document::Entity, _, _>(42_i64, am).await?;
//! ```
//!
//! Rows that do not exist and rows the principal may not see are reported
//! the same way (`None` or [`AclError::NotFound`]).

use std::sync::Arc;

use aclkit_security::AclPrincipal;
use aclkit_security::permission::{DELETE, UPDATE};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection,
    FromQueryResult, IntoActiveModel, QueryFilter, Value, sea_query::ValueTuple,
};

use crate::secure::select::primary_column;
use crate::secure::{AclEntity, AclEntityExt, AclError, AclSelect, AclSpecification, Checked};

/// Database handle with access control attached.
pub struct AclDb {
    conn: DatabaseConnection,
    spec: Arc<AclSpecification>,
}

impl AclDb {
    #[must_use]
    pub fn new(conn: DatabaseConnection, spec: Arc<AclSpecification>) -> Self {
        Self { conn, spec }
    }

    #[must_use]
    pub fn spec(&self) -> &AclSpecification {
        &self.spec
    }

    /// Return database engine identifier for tracing / logging.
    #[must_use]
    pub fn db_engine(&self) -> &'static str {
        use sea_orm::ConnectionTrait;
        use sea_orm::DbBackend;

        match self.conn.get_database_backend() {
            DbBackend::Postgres => "postgres",
            DbBackend::MySql => "mysql",
            DbBackend::Sqlite => "sqlite",
        }
    }

    /// Open a request-scoped session. `None` is the anonymous principal.
    #[must_use]
    pub fn session<'a>(&'a self, principal: Option<&'a AclPrincipal>) -> AclSession<'a> {
        AclSession {
            db: self,
            principal,
        }
    }
}

/// Request-scoped repository operations for one principal.
pub struct AclSession<'a> {
    db: &'a AclDb,
    principal: Option<&'a AclPrincipal>,
}

impl AclSession<'_> {
    #[must_use]
    pub fn principal(&self) -> Option<&AclPrincipal> {
        self.principal
    }

    /// Checked select over rows the principal holds `permission` on.
    ///
    /// # Errors
    /// [`AclError::UnknownEntity`] or [`AclError::TableMismatch`] on a
    /// metadata problem.
    pub fn find<E: AclEntity>(&self, permission: &str) -> Result<AclSelect<E, Checked>, AclError> {
        E::find()
            .acl()
            .with_permission(&self.db.spec, self.principal, permission)
    }

    /// All rows the principal holds `permission` on.
    ///
    /// # Errors
    /// Returns `AclError` on a metadata problem or database failure.
    pub async fn find_all<E: AclEntity>(&self, permission: &str) -> Result<Vec<E::Model>, AclError> {
        self.find::<E>(permission)?.all(&self.db.conn).await
    }

    /// Visible rows among `ids`.
    ///
    /// # Errors
    /// Returns `AclError` on a metadata problem or database failure.
    pub async fn find_all_by_id<E, I, V>(
        &self,
        ids: I,
        permission: &str,
    ) -> Result<Vec<E::Model>, AclError>
    where
        E: AclEntity,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.find::<E>(permission)?
            .and_ids(ids)?
            .all(&self.db.conn)
            .await
    }

    /// The row with this id, if it exists and is visible.
    ///
    /// # Errors
    /// Returns `AclError` on a metadata problem or database failure.
    pub async fn find_by_id<E, V>(&self, id: V, permission: &str) -> Result<Option<E::Model>, AclError>
    where
        E: AclEntity,
        V: Into<Value>,
    {
        self.find::<E>(permission)?
            .and_id(id)?
            .one(&self.db.conn)
            .await
    }

    /// Like [`Self::find_by_id`], but a missing or invisible row is an error.
    ///
    /// # Errors
    /// [`AclError::NotFound`] if the row is missing or not visible.
    pub async fn get_one<E, V>(&self, id: V, permission: &str) -> Result<E::Model, AclError>
    where
        E: AclEntity,
        V: Into<Value>,
    {
        self.find_by_id::<E, V>(id, permission)
            .await?
            .ok_or(AclError::NotFound)
    }

    /// First visible row matching `filter`.
    ///
    /// # Errors
    /// Returns `AclError` on a metadata problem or database failure.
    pub async fn find_one<E: AclEntity>(
        &self,
        filter: Condition,
        permission: &str,
    ) -> Result<Option<E::Model>, AclError> {
        self.find::<E>(permission)?
            .filter(filter)
            .one(&self.db.conn)
            .await
    }

    /// Number of rows the principal holds `permission` on.
    ///
    /// # Errors
    /// Returns `AclError` on a metadata problem or database failure.
    pub async fn count<E>(&self, permission: &str) -> Result<u64, AclError>
    where
        E: AclEntity,
        E::Model: FromQueryResult + Send + Sync,
    {
        self.find::<E>(permission)?.count(&self.db.conn).await
    }

    /// Object-level check: does the principal hold `permission` on this row?
    ///
    /// # Errors
    /// Returns `AclError` on a metadata problem or database failure.
    pub async fn has_permission<E, V>(&self, id: V, permission: &str) -> Result<bool, AclError>
    where
        E: AclEntity,
        E::Model: FromQueryResult + Send + Sync,
        V: Into<Value>,
    {
        let visible = self
            .find::<E>(permission)?
            .and_id(id)?
            .count(&self.db.conn)
            .await?;
        Ok(visible > 0)
    }

    /// Insert after the create check.
    ///
    /// # Errors
    /// [`AclError::CreateDenied`] if the principal may not create `E`.
    pub async fn insert<E, A>(&self, am: A) -> Result<E::Model, AclError>
    where
        E: AclEntity,
        A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
        E::Model: IntoActiveModel<A>,
    {
        if !self.db.spec.can_be_created(E::ACL_TYPE, self.principal) {
            tracing::debug!(entity = E::ACL_TYPE, "create denied");
            return Err(AclError::CreateDenied {
                entity_type: E::ACL_TYPE.to_owned(),
            });
        }
        Ok(am.insert(&self.db.conn).await?)
    }

    /// Update the row `id` if the principal holds `update` on it.
    ///
    /// The primary key of `am` is set to `id` when unset and must equal
    /// `id` otherwise.
    ///
    /// # Errors
    /// - [`AclError::NotFound`] if the row is missing or not updatable.
    /// - [`AclError::Invalid`] if `am` carries a different primary key.
    pub async fn update<E, A, V>(&self, id: V, mut am: A) -> Result<E::Model, AclError>
    where
        E: AclEntity,
        E::Model: FromQueryResult + Send + Sync + IntoActiveModel<A>,
        A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
        V: Into<Value>,
    {
        let id: Value = id.into();
        match am.get_primary_key_value() {
            Some(ValueTuple::One(current)) if current != id => {
                return Err(AclError::Invalid("primary key of the model differs from id"));
            }
            Some(ValueTuple::One(_)) => {}
            None => am.set(primary_column::<E>()?, id.clone()),
            Some(_) => {
                return Err(AclError::Invalid(
                    "entity must have a single-column primary key",
                ));
            }
        }

        if !self.has_permission::<E, _>(id, UPDATE).await? {
            return Err(AclError::NotFound);
        }
        Ok(am.update(&self.db.conn).await?)
    }

    /// Delete the row `id` if the principal holds `delete` on it.
    ///
    /// # Errors
    /// [`AclError::NotFound`] if the row is missing or not deletable.
    pub async fn delete_by_id<E, V>(&self, id: V) -> Result<(), AclError>
    where
        E: AclEntity,
        E::Model: FromQueryResult + Send + Sync,
        V: Into<Value>,
    {
        let id: Value = id.into();
        if !self.has_permission::<E, _>(id.clone(), DELETE).await? {
            return Err(AclError::NotFound);
        }
        self.delete_without_permission_check::<E, _>(id).await?;
        Ok(())
    }

    /// Fetch by id, bypassing the access rules.
    ///
    /// # Errors
    /// Returns `AclError` on a database failure.
    pub async fn find_by_id_without_permission_check<E, V>(
        &self,
        id: V,
    ) -> Result<Option<E::Model>, AclError>
    where
        E: AclEntity,
        V: Into<Value>,
    {
        let col = primary_column::<E>()?;
        Ok(E::find()
            .filter(col.eq(id))
            .one(&self.db.conn)
            .await?)
    }

    /// Delete by id, bypassing the access rules. Returns the number of rows
    /// removed.
    ///
    /// # Errors
    /// Returns `AclError` on a database failure.
    pub async fn delete_without_permission_check<E, V>(&self, id: V) -> Result<u64, AclError>
    where
        E: AclEntity,
        V: Into<Value>,
    {
        let col = primary_column::<E>()?;
        let res = E::delete_many()
            .filter(col.eq(id))
            .exec(&self.db.conn)
            .await?;
        tracing::debug!(
            entity = E::ACL_TYPE,
            rows = res.rows_affected,
            "deleted without permission check"
        );
        Ok(res.rows_affected)
    }
}
