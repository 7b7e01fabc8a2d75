//! Vendor due diligence workflow.
//!
//! ```text
//! draft -> pending_officer_review -> pending_hop_approval
//!       -> approved | approved_with_conditions | rejected
//! ```
//!
//! The officer review obtains an AI risk assessment. A `High` risk can only
//! be approved outright once a risk acceptance is recorded; approval with
//! conditions stays open.

use super::common::{self, OFFICERS};
use crate::definition::WorkflowDefinition;
use crate::status::{EntityType, Status};
use crate::transition::{DecisionRoutes, EffectTrigger, Guard, SideEffect, Transition};
use procureflix_access::Role;
use procureflix_ai::AdvisoryKind;
use procureflix_core::NumberPrefix;

/// Attribute holding the vendor number assigned on approval.
pub const VENDOR_NUMBER: &str = "vendor_number";

/// Builds the vendor due diligence workflow.
#[must_use]
pub fn definition() -> WorkflowDefinition {
    let vendor_number = || SideEffect::AllocateNumber {
        prefix: NumberPrefix::Vendor,
        attribute: VENDOR_NUMBER,
    };

    let definition = WorkflowDefinition::new(EntityType::VendorDd, Status::Draft)
        .with_terminal(&[
            Status::Approved,
            Status::ApprovedWithConditions,
            Status::Rejected,
            Status::Cancelled,
        ])
        .with_creators(&[Role::Vendor, Role::ProcurementOfficer, Role::Admin])
        .with_transition(
            Transition::new("submit")
                .from(&[Status::Draft, Status::ReturnedForRevision])
                .to(Status::PendingOfficerReview)
                .allow(&[Role::Vendor, Role::ProcurementOfficer, Role::Admin]),
        )
        .with_transition(
            Transition::new("officer_review")
                .from(&[Status::PendingOfficerReview])
                .to(Status::PendingHopApproval)
                .allow(OFFICERS)
                .advisory(AdvisoryKind::VendorRisk)
                .capture(&["officer_findings"]),
        )
        .with_transition(
            Transition::new("return_to_vendor")
                .from(&[Status::PendingOfficerReview, Status::PendingHopApproval])
                .to(Status::ReturnedForRevision)
                .allow(OFFICERS)
                .guard(Guard::NotesRequired),
        )
        .with_transition(
            common::hop_decide(DecisionRoutes {
                approved: Status::Approved,
                approved_with_conditions: Some(Status::ApprovedWithConditions),
                rejected: Status::Rejected,
                returned: Some(Status::ReturnedForRevision),
            })
            .guard(Guard::RiskAcceptanceForHighRisk {
                on: Status::Approved,
            })
            .capture(&["conditions"])
            .effect(EffectTrigger::Entering(Status::Approved), vendor_number())
            .effect(
                EffectTrigger::Entering(Status::ApprovedWithConditions),
                vendor_number(),
            ),
        );

    let definition = common::escape_hatches(definition, &[]);
    common::standard_notifications(definition)
}
