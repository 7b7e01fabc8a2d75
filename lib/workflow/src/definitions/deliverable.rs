//! Deliverable and payment authorization workflow.
//!
//! ```text
//! draft -> submitted -> under_review -> validated -> pending_hop_approval
//!       -> approved -> paid
//!       -> rejected
//! ```
//!
//! Entering `pending_hop_approval` needs a payment readiness assessment. The
//! verdict is advisory: `Not Ready` is written into the audit notes for the
//! HoP but never blocks. Approval assigns the PAF number.

use super::common::{self, OFFICERS};
use crate::definition::WorkflowDefinition;
use crate::status::{EntityType, Status};
use crate::transition::{DecisionRoutes, EffectTrigger, Guard, SideEffect, Transition};
use procureflix_access::Role;
use procureflix_ai::AdvisoryKind;
use procureflix_core::NumberPrefix;

/// Attribute holding the payment authorization number.
pub const PAF_NUMBER: &str = "paf_number";

/// Builds the deliverable workflow.
#[must_use]
pub fn definition() -> WorkflowDefinition {
    let definition = WorkflowDefinition::new(EntityType::Deliverable, Status::Draft)
        .with_terminal(&[Status::Paid, Status::Rejected, Status::Cancelled])
        .with_creators(&[Role::Vendor, Role::Requester, Role::ProcurementOfficer, Role::Admin])
        .with_transition(
            Transition::new("submit")
                .from(&[Status::Draft, Status::ReturnedForRevision])
                .to(Status::Submitted)
                .allow(&[Role::Vendor, Role::Requester, Role::ProcurementOfficer, Role::Admin]),
        )
        .with_transition(
            Transition::new("start_review")
                .from(&[Status::Submitted])
                .to(Status::UnderReview)
                .allow(OFFICERS),
        )
        .with_transition(common::officer_validate(&[Status::UnderReview]))
        .with_transition(common::return_for_revision(&[
            Status::Submitted,
            Status::UnderReview,
            Status::Validated,
        ]))
        .with_transition(
            Transition::new("forward_to_hop")
                .from(&[Status::Validated])
                .to(Status::PendingHopApproval)
                .allow(OFFICERS)
                .advisory(AdvisoryKind::PaymentReadiness)
                .guard(Guard::AdvisoryRequired(AdvisoryKind::PaymentReadiness)),
        )
        .with_transition(
            common::hop_decide(DecisionRoutes {
                approved: Status::Approved,
                approved_with_conditions: None,
                rejected: Status::Rejected,
                returned: Some(Status::ReturnedForRevision),
            })
            .effect(
                EffectTrigger::Entering(Status::Approved),
                SideEffect::AllocateNumber {
                    prefix: NumberPrefix::PaymentAuthorization,
                    attribute: PAF_NUMBER,
                },
            ),
        )
        .with_transition(
            Transition::new("mark_paid")
                .from(&[Status::Approved])
                .to(Status::Paid)
                .allow(OFFICERS)
                .capture(&["payment_reference"]),
        );

    let mut definition = common::escape_hatches(definition, &[Status::Approved]);
    // The shortcut to the HoP still needs the readiness verdict.
    if let Some(skip) = definition
        .transitions
        .iter_mut()
        .find(|t| t.name == "skip_to_hop")
    {
        skip.advisory = Some(AdvisoryKind::PaymentReadiness);
        skip.guards.push(Guard::AdvisoryRequired(AdvisoryKind::PaymentReadiness));
    }
    common::standard_notifications(definition)
}
