//! Error types for the access crate.

use procureflix_core::UserId;
use std::fmt;

/// Errors from actor directory lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// No actor is registered under the id.
    UnknownActor { actor_id: UserId },
    /// The directory backend could not be reached.
    Unavailable { reason: String },
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownActor { actor_id } => write!(f, "unknown actor: {actor_id}"),
            Self::Unavailable { reason } => write!(f, "actor directory unavailable: {reason}"),
        }
    }
}

impl std::error::Error for DirectoryError {}
