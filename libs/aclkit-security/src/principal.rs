use std::collections::BTreeSet;

use crate::IdValue;

/// `AclPrincipal` is the authenticated caller a query is compiled for.
///
/// Resolved by the application's authentication layer and passed by
/// reference into every compile or repository call. The identifier is
/// compared against owner columns; the authorities are matched against
/// role rules.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AclPrincipal {
    /// Primary key of the principal's own row in the user entity.
    user_id: IdValue,
    /// Login name, informational only.
    #[serde(default)]
    username: String,
    /// Granted authorities (`ROLE_ADMIN`, `ROLE_EDITOR`, ...).
    #[serde(default)]
    authorities: BTreeSet<String>,
}

impl AclPrincipal {
    /// Create a new `AclPrincipal` builder
    #[must_use]
    pub fn builder(user_id: impl Into<IdValue>) -> AclPrincipalBuilder {
        AclPrincipalBuilder {
            user_id: user_id.into(),
            username: String::new(),
            authorities: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &IdValue {
        &self.user_id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    /// True if the principal holds at least one of `authorities`.
    #[must_use]
    pub fn has_any_authority<'a, I>(&self, authorities: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        authorities.into_iter().any(|a| self.has_authority(a))
    }
}

pub struct AclPrincipalBuilder {
    user_id: IdValue,
    username: String,
    authorities: BTreeSet<String>,
}

impl AclPrincipalBuilder {
    #[must_use]
    pub fn username(mut self, username: &str) -> Self {
        username.clone_into(&mut self.username);
        self
    }

    #[must_use]
    pub fn authority(mut self, authority: &str) -> Self {
        self.authorities.insert(authority.to_owned());
        self
    }

    #[must_use]
    pub fn authorities<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorities
            .extend(authorities.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn build(self) -> AclPrincipal {
        AclPrincipal {
            user_id: self.user_id,
            username: self.username,
            authorities: self.authorities,
        }
    }
}
