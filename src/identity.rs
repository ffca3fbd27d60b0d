//! Identity scoping for credential lookups.
//!
//! Credentials are stored and retrieved per (user, organization) pair. The
//! pair comes from the surrounding form and is immutable for the duration of
//! one connection attempt.

use serde::{Deserialize, Serialize};

/// The (user, organization) pair that namespaces credential storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user: String,
    pub org: String,
}

impl Identity {
    pub fn new(user: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            org: org.into(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.user, self.org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_user_and_org() {
        let identity = Identity::new("TestUser", "TestOrg");
        assert_eq!(identity.to_string(), "TestUser@TestOrg");
    }
}
