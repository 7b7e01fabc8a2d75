//! Error types for the store crate.

use procureflix_core::EntityId;
use procureflix_workflow::EntityType;
use std::fmt;

/// Errors from entity and counter storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An entity with this id already exists.
    AlreadyExists {
        entity_type: EntityType,
        entity_id: EntityId,
    },
    /// A stored document could not be encoded or decoded.
    Serialization { reason: String },
    /// The backing store could not be reached.
    Unavailable { reason: String },
    /// A counter kept changing underneath the allocator.
    CounterContention { scope: String, attempts: u32 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists {
                entity_type,
                entity_id,
            } => {
                write!(f, "{entity_type} {entity_id} already exists")
            }
            Self::Serialization { reason } => {
                write!(f, "document serialization failed: {reason}")
            }
            Self::Unavailable { reason } => {
                write!(f, "store unavailable: {reason}")
            }
            Self::CounterContention { scope, attempts } => {
                write!(
                    f,
                    "counter '{scope}' still contended after {attempts} attempts"
                )
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
