//! Business request (tender) workflow.
//!
//! ```text
//! draft -> under_review -> validated -> [reviewers] -> [approvers]
//!       -> pending_hop_approval -> awarded | rejected
//! ```
//!
//! Awarding provisions the downstream contract.

use super::common::{self, OFFICERS};
use crate::definition::WorkflowDefinition;
use crate::status::{EntityType, Status};
use crate::transition::{DecisionRoutes, EffectTrigger, SideEffect, Transition};
use procureflix_access::Role;

/// Payload field naming the winning proposal.
pub const SELECTED_PROPOSAL: &str = "selected_proposal_id";

/// Payload field naming the winning proposal's vendor.
pub const SELECTED_VENDOR: &str = "selected_vendor_id";

/// Builds the business request workflow.
#[must_use]
pub fn definition() -> WorkflowDefinition {
    let definition = WorkflowDefinition::new(EntityType::BusinessRequest, Status::Draft)
        .with_terminal(&[Status::Awarded, Status::Rejected, Status::Cancelled])
        .with_creators(&[Role::Requester, Role::ProcurementOfficer, Role::Admin])
        .with_transition(
            Transition::new("submit")
                .from(&[Status::Draft, Status::ReturnedForRevision])
                .to(Status::UnderReview)
                .allow(&[Role::Requester, Role::ProcurementOfficer, Role::Admin]),
        )
        .with_transition(
            common::officer_validate(&[Status::UnderReview])
                .capture(&[SELECTED_PROPOSAL, SELECTED_VENDOR]),
        )
        .with_transition(common::return_for_revision(&[
            Status::UnderReview,
            Status::Validated,
            Status::ReviewComplete,
            Status::ApprovalComplete,
        ]))
        .with_transition(
            common::hop_decide(DecisionRoutes {
                approved: Status::Awarded,
                approved_with_conditions: None,
                rejected: Status::Rejected,
                returned: Some(Status::ReturnedForRevision),
            })
            .effect(
                EffectTrigger::Entering(Status::Awarded),
                SideEffect::AutoProvisionContract,
            ),
        );

    let definition = common::gated_review(definition);
    let definition = common::escape_hatches(definition, &[]);
    common::standard_notifications(definition)
}
