//! Building blocks shared by the concrete workflows.

use crate::definition::WorkflowDefinition;
use crate::gate::{GateName, GatePolicy};
use crate::status::Status;
use crate::transition::{DecisionRoutes, GateRoutes, Guard, Recipients, Transition};
use procureflix_access::Role;

/// Roles that run the day-to-day steps.
pub(crate) const OFFICERS: &[Role] = &[Role::ProcurementOfficer, Role::Admin];

/// The final decision authority.
pub(crate) const HOP: &[Role] = &[Role::HeadOfProcurement];

/// Roles that may sit on a review or approval gate.
pub(crate) const GATE_VOTERS: &[Role] = &[
    Role::Requester,
    Role::ProcurementOfficer,
    Role::ProcurementManager,
    Role::HeadOfProcurement,
    Role::Admin,
];

pub(crate) fn officer_validate(from: &[Status]) -> Transition {
    Transition::new("officer_validate")
        .from(from)
        .to(Status::Validated)
        .allow(OFFICERS)
}

pub(crate) fn return_for_revision(from: &[Status]) -> Transition {
    Transition::new("return_for_revision")
        .from(from)
        .to(Status::ReturnedForRevision)
        .allow(OFFICERS)
        .guard(Guard::NotesRequired)
}

pub(crate) fn hop_decide(routes: DecisionRoutes) -> Transition {
    Transition::new("hop_decide")
        .from(&[Status::PendingHopApproval])
        .decide(routes)
        .allow(HOP)
}

/// Adds the reviewer and approver gates and the transitions that drive them.
///
/// `forward_for_approval` also leaves from `pending_review`, so an officer can
/// move on without waiting for every reviewer.
pub(crate) fn gated_review(definition: WorkflowDefinition) -> WorkflowDefinition {
    definition
        .with_gate(GateName::Reviewers, GatePolicy::AllOf, Status::PendingReview)
        .with_gate(GateName::Approvers, GatePolicy::AllOf, Status::PendingApproval)
        .with_transition(
            Transition::new("forward_for_review")
                .from(&[Status::Validated])
                .to(Status::PendingReview)
                .allow(OFFICERS),
        )
        .with_transition(
            Transition::new("review_decide")
                .from(&[Status::PendingReview])
                .vote(
                    GateName::Reviewers,
                    GateRoutes {
                        all_approved: Status::ReviewComplete,
                        any_rejected: Status::ReturnedForRevision,
                        any_returned: Status::ReturnedForRevision,
                    },
                )
                .allow(GATE_VOTERS),
        )
        .with_transition(
            Transition::new("forward_for_approval")
                .from(&[Status::Validated, Status::PendingReview, Status::ReviewComplete])
                .to(Status::PendingApproval)
                .allow(OFFICERS),
        )
        .with_transition(
            Transition::new("approval_decide")
                .from(&[Status::PendingApproval])
                .vote(
                    GateName::Approvers,
                    GateRoutes {
                        all_approved: Status::ApprovalComplete,
                        any_rejected: Status::Rejected,
                        any_returned: Status::ReturnedForRevision,
                    },
                )
                .allow(GATE_VOTERS),
        )
        .with_transition(
            Transition::new("forward_to_hop")
                .from(&[Status::ApprovalComplete])
                .to(Status::PendingHopApproval)
                .allow(OFFICERS),
        )
        .with_transition(
            Transition::new("re_forward")
                .from(&[Status::ReturnedForRevision])
                .choose(&[
                    Status::PendingReview,
                    Status::PendingApproval,
                    Status::PendingHopApproval,
                ])
                .allow(OFFICERS),
        )
        .notify_on_entry(
            Status::PendingReview,
            Recipients::GateAssignees(GateName::Reviewers),
            "review requested",
        )
        .notify_on_entry(
            Status::PendingApproval,
            Recipients::GateAssignees(GateName::Approvers),
            "approval requested",
        )
}

/// Adds `skip_to_hop` and `cancel`, which leave from every open state.
///
/// Call this after every other transition is in place; `skip_except` names
/// open states the HoP shortcut must not leave from.
pub(crate) fn escape_hatches(
    definition: WorkflowDefinition,
    skip_except: &[Status],
) -> WorkflowDefinition {
    let mut skip_sources = vec![Status::PendingHopApproval];
    skip_sources.extend_from_slice(skip_except);
    let skip_from = definition.open_states_except(&skip_sources);
    let cancel_from = definition.open_states_except(&[]);

    definition
        .with_transition(
            Transition::new("skip_to_hop")
                .from(&skip_from)
                .to(Status::PendingHopApproval)
                .allow(OFFICERS)
                .guard(Guard::NotesRequired),
        )
        .with_transition(
            Transition::new("cancel")
                .from(&cancel_from)
                .to(Status::Cancelled)
                .allow(OFFICERS)
                .guard(Guard::NotesRequired),
        )
}

/// Notifies the HoP on arrival for a decision and the creator on every outcome.
pub(crate) fn standard_notifications(definition: WorkflowDefinition) -> WorkflowDefinition {
    let terminal = definition.terminal.clone();
    let definition = definition
        .notify_on_entry(
            Status::PendingHopApproval,
            Recipients::Role(Role::HeadOfProcurement),
            "awaiting Head of Procurement decision",
        )
        .notify_on_entry(
            Status::ReturnedForRevision,
            Recipients::Creator,
            "returned for revision",
        );
    terminal.into_iter().fold(definition, |definition, status| {
        definition.notify_on_entry(status, Recipients::Creator, format!("closed as {status}"))
    })
}
