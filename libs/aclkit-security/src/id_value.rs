use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A primary-key value of a principal or a row.
///
/// Entities in the same schema may use different key types, so identifiers
/// are carried as a small typed union and converted to a query value only at
/// the query boundary.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    /// Integer key (`BIGINT`, `INTEGER`).
    Int(i64),
    /// UUID key.
    Uuid(Uuid),
    /// Textual key (usernames, slugs, external ids).
    String(String),
}

impl IdValue {
    /// Parse a textual identifier, preferring integer then UUID forms.
    ///
    /// Never fails: anything that is neither an integer nor a UUID stays a
    /// string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<i64>() {
            return Self::Int(n);
        }
        if let Ok(u) = Uuid::parse_str(raw) {
            return Self::Uuid(u);
        }
        Self::String(raw.to_owned())
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<Uuid> for IdValue {
    #[inline]
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<&Uuid> for IdValue {
    #[inline]
    fn from(u: &Uuid) -> Self {
        Self::Uuid(*u)
    }
}

impl From<String> for IdValue {
    #[inline]
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for IdValue {
    #[inline]
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<i64> for IdValue {
    #[inline]
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for IdValue {
    #[inline]
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}
