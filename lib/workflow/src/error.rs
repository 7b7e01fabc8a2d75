//! Error types for the workflow crate.
//!
//! Every rejection names what would have made the request succeed (allowed
//! source states, allowed roles, available transitions), so the message is
//! useful to end users and to tests alike.

use crate::gate::{Decision, GateName};
use crate::status::{EntityType, Status};
use procureflix_access::Role;
use procureflix_ai::AdvisoryKind;
use procureflix_core::{EntityId, UserId};
use std::fmt;

/// Errors from workflow engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The transition is not defined for this entity type.
    UnknownTransition {
        entity_type: EntityType,
        transition: String,
        available: Vec<String>,
    },
    /// The entity is not in an eligible source state.
    InvalidStateTransition {
        transition: String,
        current: Status,
        allowed_from: Vec<Status>,
    },
    /// The actor's role may not request this transition.
    Forbidden {
        transition: String,
        role: Role,
        allowed_roles: Vec<Role>,
    },
    /// The actor holds no seat on the gate.
    NotAnAssignee { gate: GateName, actor_id: UserId },
    /// The actor already decided on the gate.
    AlreadyDecided {
        gate: GateName,
        actor_id: UserId,
        decision: Decision,
    },
    /// A gate was opened without assignees.
    EmptyAssigneeList { gate: GateName },
    /// The workflow has no such gate.
    UnknownGate {
        entity_type: EntityType,
        gate: GateName,
    },
    /// No vendor could be resolved for an award.
    NoAwardTarget { entity_id: EntityId },
    /// High vendor risk must be accepted before approval.
    MissingRiskAcceptance { entity_id: EntityId },
    /// The transition needs an advisory assessment that is not attached.
    MissingAdvisoryAssessment {
        entity_id: EntityId,
        kind: AdvisoryKind,
    },
    /// A payload field is missing or unacceptable.
    InvalidPayload { field: String, reason: String },
    /// Only approved or paid deliverables can be exported.
    NotExportable { entity_id: EntityId, status: Status },
    /// The operation does not apply to this entity type.
    EntityTypeMismatch {
        expected: EntityType,
        actual: EntityType,
    },
    /// The entity is in a terminal state.
    TerminalEntity { entity_id: EntityId, status: Status },
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTransition {
                entity_type,
                transition,
                available,
            } => {
                write!(
                    f,
                    "unknown transition '{transition}' for {entity_type} (available: {})",
                    join(available)
                )
            }
            Self::InvalidStateTransition {
                transition,
                current,
                allowed_from,
            } => {
                write!(
                    f,
                    "cannot apply '{transition}' from status '{current}' (allowed from: {})",
                    join(allowed_from)
                )
            }
            Self::Forbidden {
                transition,
                role,
                allowed_roles,
            } => {
                write!(
                    f,
                    "role '{role}' may not apply '{transition}' (allowed roles: {})",
                    join(allowed_roles)
                )
            }
            Self::NotAnAssignee { gate, actor_id } => {
                write!(f, "user {actor_id} is not assigned to the {gate} gate")
            }
            Self::AlreadyDecided {
                gate,
                actor_id,
                decision,
            } => {
                write!(
                    f,
                    "user {actor_id} already decided '{decision}' on the {gate} gate"
                )
            }
            Self::EmptyAssigneeList { gate } => {
                write!(f, "the {gate} gate needs at least one assignee")
            }
            Self::UnknownGate { entity_type, gate } => {
                write!(f, "{entity_type} workflow has no {gate} gate")
            }
            Self::NoAwardTarget { entity_id } => {
                write!(
                    f,
                    "no vendor to award {entity_id} to: give award_vendor_id or select a proposal first"
                )
            }
            Self::MissingRiskAcceptance { entity_id } => {
                write!(
                    f,
                    "{entity_id} is assessed as high risk and needs a recorded risk acceptance before approval"
                )
            }
            Self::MissingAdvisoryAssessment { entity_id, kind } => {
                write!(f, "{entity_id} has no {kind} assessment attached")
            }
            Self::InvalidPayload { field, reason } => {
                write!(f, "invalid payload field '{field}': {reason}")
            }
            Self::NotExportable { entity_id, status } => {
                write!(
                    f,
                    "{entity_id} is '{status}' and can only be exported once approved"
                )
            }
            Self::EntityTypeMismatch { expected, actual } => {
                write!(f, "operation applies to {expected}, not {actual}")
            }
            Self::TerminalEntity { entity_id, status } => {
                write!(f, "{entity_id} is closed with status '{status}'")
            }
        }
    }
}

impl std::error::Error for WorkflowError {}

impl WorkflowError {
    pub(crate) fn invalid_payload(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_lists_allowed_sources() {
        let err = WorkflowError::InvalidStateTransition {
            transition: "hop_decide".to_string(),
            current: Status::Awarded,
            allowed_from: vec![Status::PendingHopApproval],
        };
        let message = err.to_string();
        assert!(message.contains("'awarded'"));
        assert!(message.contains("pending_hop_approval"));
    }

    #[test]
    fn forbidden_lists_allowed_roles() {
        let err = WorkflowError::Forbidden {
            transition: "hop_decide".to_string(),
            role: Role::ProcurementOfficer,
            allowed_roles: vec![Role::HeadOfProcurement],
        };
        assert!(err.to_string().contains("head_of_procurement"));
    }

    #[test]
    fn unknown_transition_lists_available() {
        let err = WorkflowError::UnknownTransition {
            entity_type: EntityType::Deliverable,
            transition: "award".to_string(),
            available: vec!["submit".to_string(), "hop_decide".to_string()],
        };
        assert!(err.to_string().contains("submit, hop_decide"));
    }
}
