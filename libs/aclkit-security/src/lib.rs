#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod id_value;
pub mod permission;
pub mod principal;

pub use id_value::IdValue;
pub use permission::{Permission, PermissionError, PermissionSet};
pub use principal::{AclPrincipal, AclPrincipalBuilder};
