//! Row-level access control for `SeaORM` queries.
//!
//! Access rules are compiled into the `WHERE` clause of the query itself:
//! the compiler adds the left joins it needs, marks the statement
//! `DISTINCT`, and returns a condition that holds exactly for the rows the
//! principal may act on. Nothing is loaded and checked in memory.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use aclkit_db::secure::{AclDb, AclEntity, AclEntityExt, AclSpecification};
//!
//! impl AclEntity for document::Entity {
//!     const ACL_TYPE: &'static str = "document";
//! }
//!
//! let spec = AclSpecification::from_schema(&settings.schema, settings.acl)?;
//!
//! // Typestate select
//! let docs = document::Entity::find()
//!     .acl()
//!     .with_permission(&spec, Some(&principal), "read")?
//!     .all(&conn)
//!     .await?;
//!
//! // Repository session
//! let db = AclDb::new(conn, Arc::new(spec));
//! let doc = db.session(Some(&principal)).get_one::<document::Entity, _>(7_i64, "update").await?;
//! ```
//!
//! # Policy
//!
//! | Situation | Behavior |
//! |-----------|----------|
//! | Role permission covers the request | No filter |
//! | Role conditions exist, none met | Deny all (`WHERE FALSE`) |
//! | Anonymous principal | Deny all |
//! | No access path applies | Deny all |
//! | Otherwise | OR of access paths over `acl_N` left joins |
//!
//! Access paths are checked in this order: the user row itself, owners,
//! owner groups, permission links, then parents (up to `max_depth` levels,
//! with the permission rescoped by the parent prefix).

mod acl_conn;
mod compiler;
mod cond;
mod entity_traits;
mod error;
mod join;
mod select;
mod specification;

pub use entity_traits::AclEntity;
pub use error::AclError;

pub use join::ALIAS_PREFIX;
pub use specification::{AclFilter, AclSpecification, QueryTarget};

pub use select::{AclEntityExt, AclSelect, Checked, Unchecked, primary_column};

pub use acl_conn::{AclDb, AclSession};
