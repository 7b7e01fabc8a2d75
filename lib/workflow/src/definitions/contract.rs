//! Contract governance workflow.
//!
//! Hand-made contracts start in `draft`; contracts provisioned from an
//! awarded business request start in `pending_completion` until an officer
//! fills in the remaining details.

use super::common::{self, OFFICERS};
use crate::definition::WorkflowDefinition;
use crate::status::{EntityType, Status};
use crate::transition::{DecisionRoutes, Transition};

/// Builds the contract governance workflow.
#[must_use]
pub fn definition() -> WorkflowDefinition {
    let definition = WorkflowDefinition::new(EntityType::Contract, Status::Draft)
        .with_terminal(&[Status::Approved, Status::Rejected, Status::Cancelled])
        .with_creators(OFFICERS)
        .with_transition(
            Transition::new("complete_details")
                .from(&[Status::PendingCompletion])
                .to(Status::Draft)
                .allow(OFFICERS)
                .capture(&["start_date", "end_date", "contract_type", "value"]),
        )
        .with_transition(
            Transition::new("submit")
                .from(&[Status::Draft, Status::ReturnedForRevision])
                .to(Status::UnderReview)
                .allow(OFFICERS),
        )
        .with_transition(common::officer_validate(&[Status::UnderReview]))
        .with_transition(common::return_for_revision(&[
            Status::UnderReview,
            Status::Validated,
            Status::ReviewComplete,
            Status::ApprovalComplete,
        ]))
        .with_transition(common::hop_decide(DecisionRoutes {
            approved: Status::Approved,
            approved_with_conditions: None,
            rejected: Status::Rejected,
            returned: Some(Status::ReturnedForRevision),
        }));

    let definition = common::gated_review(definition);
    let definition = common::escape_hatches(definition, &[Status::PendingCompletion]);
    common::standard_notifications(definition)
}
