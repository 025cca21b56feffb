//! Authenticated principal attached to a connection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Roles that grant staff-wide access.
pub const PRIVILEGED_ROLES: [&str; 3] = ["admin", "manager", "technician"];

/// The user behind a connection, as stated by a verified access token.
///
/// Captured once at upgrade time and kept for the connection's lifetime;
/// role changes made afterwards are not seen by an open connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject: the user id.
    pub sub: String,
    /// Role names. Empty for a plain customer.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Identity {
    /// Creates an identity from a user id and role names.
    #[must_use]
    pub fn new<I, S>(sub: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sub: sub.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if any role is admin, manager or technician.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        PRIVILEGED_ROLES.iter().any(|role| self.roles.contains(*role))
    }

    /// Returns `true` if `user_id` is this identity's subject.
    #[must_use]
    pub fn is_user(&self, user_id: &str) -> bool {
        self.sub == user_id
    }
}
