//! Hierarchical permission tokens.
//!
//! A token is zero or more scope segments joined by [`PREFIX_DELIMITER`],
//! terminated by a base permission: `read`, `task:update`,
//! `project:task:all`. Scopes are produced by parent relations that carry a
//! permission prefix; matching walks them from the innermost scope outward.
//!
//! ```
//! use aclkit_security::permission::{self, Permission};
//!
//! let p = Permission::parse("project:task:update");
//! assert_eq!(p.base(), "update");
//! assert_eq!(p.scopes().collect::<Vec<_>>(), ["project:task:", "project:", ""]);
//!
//! assert!(permission::grants("project:task:all", "project:task:update"));
//! assert!(permission::grants("update", "project:task:update"));
//! assert!(!permission::grants("project:task:read", "project:task:update"));
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const READ: &str = "read";
pub const UPDATE: &str = "update";
pub const DELETE: &str = "delete";
pub const CREATE: &str = "create";

/// Wildcard base permission, covers every other base permission.
pub const ALL: &str = "all";

/// Separates scope segments from each other and from the base permission.
pub const PREFIX_DELIMITER: char = ':';

/// Malformed permission token or prefix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    #[error("permission token is empty")]
    Empty,

    #[error("permission token '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("permission token '{0}' contains whitespace")]
    Whitespace(String),
}

/// Validate a full permission token (`read`, `task:update`).
///
/// # Errors
/// Returns [`PermissionError`] for empty tokens, empty segments (`a::read`,
/// `:read`, `read:`) or tokens containing whitespace.
pub fn validate(token: &str) -> Result<(), PermissionError> {
    if token.is_empty() {
        return Err(PermissionError::Empty);
    }
    validate_segments(token)
}

/// Validate a permission prefix as declared on a parent relation.
///
/// The empty prefix is valid and means "no re-scoping".
///
/// # Errors
/// Same rules as [`validate`] for non-empty prefixes.
pub fn validate_prefix(prefix: &str) -> Result<(), PermissionError> {
    if prefix.is_empty() {
        return Ok(());
    }
    validate_segments(prefix)
}

fn validate_segments(token: &str) -> Result<(), PermissionError> {
    if token.chars().any(char::is_whitespace) {
        return Err(PermissionError::Whitespace(token.to_owned()));
    }
    if token.split(PREFIX_DELIMITER).any(str::is_empty) {
        return Err(PermissionError::EmptySegment(token.to_owned()));
    }
    Ok(())
}

/// Re-scope `permission` under `prefix`.
///
/// An empty prefix leaves the permission unchanged.
#[must_use]
pub fn prefixed(prefix: &str, permission: &str) -> String {
    if prefix.is_empty() {
        permission.to_owned()
    } else {
        format!("{prefix}{PREFIX_DELIMITER}{permission}")
    }
}

/// Check whether a stored permission value grants the requested permission.
///
/// This is the in-memory counterpart of the permission-link ON condition:
/// a stored value matches if it matches at ANY scope level of the request,
/// from the innermost prefix out to the top level.
///
/// - top level, `read`: any value without a delimiter
/// - top level, other: `all` or the base permission itself
/// - nested scope `p`, `read`: any value starting with `p`
/// - nested scope `p`, other: `p` + `all` or `p` + base
#[must_use]
pub fn grants(stored: &str, requested: &str) -> bool {
    let requested = Permission::parse(requested);
    let base = requested.base();
    requested.scopes().any(|scope| {
        if scope.is_empty() {
            if base == READ {
                !stored.contains(PREFIX_DELIMITER)
            } else {
                stored == ALL || stored == base
            }
        } else if base == READ {
            stored.starts_with(scope)
        } else {
            stored
                .strip_prefix(scope)
                .is_some_and(|rest| rest == ALL || rest == base)
        }
    })
}

/// A parsed view over a permission token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission<'a> {
    token: &'a str,
    split: usize,
}

impl<'a> Permission<'a> {
    /// Split a token into its scope prefix and base permission.
    #[must_use]
    pub fn parse(token: &'a str) -> Self {
        let split = token.rfind(PREFIX_DELIMITER).map_or(0, |i| i + 1);
        Self { token, split }
    }

    #[must_use]
    pub fn as_str(&self) -> &'a str {
        self.token
    }

    /// The final segment (`update` in `task:update`).
    #[must_use]
    pub fn base(&self) -> &'a str {
        &self.token[self.split..]
    }

    /// All scope segments including the trailing delimiter (`task:` in
    /// `task:update`), or `""` for top-level tokens.
    #[must_use]
    pub fn prefix(&self) -> &'a str {
        &self.token[..self.split]
    }

    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.split > 0
    }

    /// Scopes from the innermost prefix outward, always ending with `""`.
    #[must_use]
    pub fn scopes(&self) -> Scopes<'a> {
        Scopes {
            next: Some(self.prefix()),
        }
    }
}

impl fmt::Display for Permission<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token)
    }
}

/// Iterator returned by [`Permission::scopes`].
#[derive(Debug, Clone)]
pub struct Scopes<'a> {
    next: Option<&'a str>,
}

impl<'a> Iterator for Scopes<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current.is_empty() {
            None
        } else {
            Some(enclosing_scope(current))
        };
        Some(current)
    }
}

/// Drop the innermost segment of a scope: `a:b:` -> `a:` -> ``.
fn enclosing_scope(scope: &str) -> &str {
    let without_delimiter = &scope[..scope.len() - 1];
    without_delimiter
        .rfind(PREFIX_DELIMITER)
        .map_or("", |i| &scope[..=i])
}

/// A set of permission tokens attached to a rule (owner, parent, role).
///
/// Coverage is exact-string: a set covers a permission if it contains it
/// verbatim or contains [`ALL`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    #[must_use]
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(permissions.into_iter().map(Into::into).collect())
    }

    /// The `{all}` set.
    #[must_use]
    pub fn all() -> Self {
        Self::new([ALL])
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.0.contains(permission) || self.0.contains(ALL)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Validate every token in the set.
    ///
    /// # Errors
    /// Returns the first [`PermissionError`] encountered.
    pub fn validate(&self) -> Result<(), PermissionError> {
        self.tokens().try_for_each(validate)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, p) in self.tokens().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p)?;
        }
        f.write_str("}")
    }
}
