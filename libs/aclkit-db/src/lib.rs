#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Row-level ACL predicates for `SeaORM`.
//!
//! - [`metadata`]: declarative schema and the validated registry built from it.
//! - [`secure`]: predicate compiler, checked selects, and the repository session.
//! - [`config`]: compiler settings loaded with `figment`.

pub mod config;
pub mod metadata;
pub mod secure;

pub use config::{AclConfig, AclSettings, ConfigError, OwnerGroupMode, UnmanagedCreatePolicy};
pub use metadata::{AclEntityMetaData, AclMetaData, MetaDataError, SchemaDecl};
pub use secure::{
    AclDb, AclEntity, AclEntityExt, AclError, AclFilter, AclSelect, AclSession,
    AclSpecification, QueryTarget,
};
