//! Error types for the approvals crate.
//!
//! Service operations return `Report<ApprovalError>`; callers recover the
//! kind with `report.current_context()` and map it to a response.

use procureflix_core::{EntityId, UserId};
use procureflix_workflow::{EntityType, WorkflowError};
use std::fmt;

/// Errors from approval service operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    /// The engine rejected the request.
    Workflow(WorkflowError),
    /// No such entity.
    NotFound {
        entity_type: EntityType,
        entity_id: EntityId,
    },
    /// The acting or assigned user is not in the directory.
    UnknownActor { actor_id: UserId },
    /// Other writers kept winning; the caller should retry later.
    ConcurrentModification { entity_id: EntityId, attempts: u32 },
    /// The entity or counter store failed.
    Store { reason: String },
    /// The actor directory failed.
    Directory { reason: String },
    /// A required advisory assessment could not be obtained.
    Advisory { reason: String },
}

impl fmt::Display for ApprovalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workflow(err) => write!(f, "{err}"),
            Self::NotFound {
                entity_type,
                entity_id,
            } => {
                write!(f, "{entity_type} {entity_id} not found")
            }
            Self::UnknownActor { actor_id } => write!(f, "unknown actor: {actor_id}"),
            Self::ConcurrentModification {
                entity_id,
                attempts,
            } => {
                write!(
                    f,
                    "{entity_id} was modified concurrently {attempts} times, please retry"
                )
            }
            Self::Store { reason } => write!(f, "store failure: {reason}"),
            Self::Directory { reason } => write!(f, "actor directory failure: {reason}"),
            Self::Advisory { reason } => write!(f, "advisory assessment failed: {reason}"),
        }
    }
}

impl std::error::Error for ApprovalError {}

impl From<WorkflowError> for ApprovalError {
    fn from(err: WorkflowError) -> Self {
        Self::Workflow(err)
    }
}

impl From<procureflix_store::StoreError> for ApprovalError {
    fn from(err: procureflix_store::StoreError) -> Self {
        Self::Store {
            reason: err.to_string(),
        }
    }
}

impl From<procureflix_access::DirectoryError> for ApprovalError {
    fn from(err: procureflix_access::DirectoryError) -> Self {
        match err {
            procureflix_access::DirectoryError::UnknownActor { actor_id } => {
                Self::UnknownActor { actor_id }
            }
            other => Self::Directory {
                reason: other.to_string(),
            },
        }
    }
}

impl ApprovalError {
    /// Returns the engine error, if that is what this is.
    #[must_use]
    pub fn workflow(&self) -> Option<&WorkflowError> {
        match self {
            Self::Workflow(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procureflix_access::DirectoryError;

    #[test]
    fn unknown_actor_keeps_its_kind() {
        let actor_id = UserId::new();
        let err: ApprovalError = DirectoryError::UnknownActor { actor_id }.into();
        assert_eq!(err, ApprovalError::UnknownActor { actor_id });

        let err: ApprovalError = DirectoryError::Unavailable {
            reason: "timeout".to_string(),
        }
        .into();
        assert!(matches!(err, ApprovalError::Directory { .. }));
    }

    #[test]
    fn concurrent_modification_asks_for_retry() {
        let err = ApprovalError::ConcurrentModification {
            entity_id: EntityId::new(),
            attempts: 3,
        };
        assert!(err.to_string().contains("please retry"));
    }
}
