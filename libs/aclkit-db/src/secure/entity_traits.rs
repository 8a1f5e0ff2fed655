use sea_orm::EntityTrait;

/// Binds a `SeaORM` entity to its type identifier in the ACL schema.
///
/// The identifier selects the [`AclEntityMetaData`] used when compiling
/// filters for queries on this entity. The metadata's `table` must equal
/// the entity's table name; a mismatch is reported when a query is checked.
///
/// # Example
/// ```rust,ignore
/// use aclkit_db::secure::AclEntity;
///
/// #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
/// #[sea_orm(table_name = "documents")]
/// pub struct Model {
///     #[sea_orm(primary_key)]
///     pub id: i64,
///     pub owner_id: i64,
///     pub title: String,
/// }
///
/// impl AclEntity for Entity {
///     const ACL_TYPE: &'static str = "document";
/// }
/// ```
///
/// [`AclEntityMetaData`]: crate::metadata::AclEntityMetaData
pub trait AclEntity: EntityTrait {
    const ACL_TYPE: &'static str;
}
