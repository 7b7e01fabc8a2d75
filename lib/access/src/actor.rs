//! The acting user.

use crate::role::Role;
use procureflix_core::UserId;
use serde::{Deserialize, Serialize};

/// A resolved user acting on a workflow entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Platform user ID.
    pub id: UserId,
    /// The role used for permission checks.
    pub role: Role,
    /// Display name, recorded on gate assignments and audit entries.
    pub display_name: String,
    /// Email address for notification addressing, if known.
    pub email: Option<String>,
}

impl Actor {
    /// Creates an actor with a fresh id.
    #[must_use]
    pub fn new(role: Role, display_name: impl Into<String>) -> Self {
        Self::with_id(UserId::new(), role, display_name)
    }

    /// Creates an actor with a known id.
    #[must_use]
    pub fn with_id(id: UserId, role: Role, display_name: impl Into<String>) -> Self {
        Self {
            id,
            role,
            display_name: display_name.into(),
            email: None,
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
