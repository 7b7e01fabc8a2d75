//! Declarative transitions.
//!
//! A [`Transition`] is static configuration: which states it leaves from,
//! who may request it, how its destination is chosen and what it triggers.
//! Definitions build them with the chained builder below.

use crate::gate::{Decision, GateName, GateOutcome};
use crate::status::Status;
use procureflix_access::Role;
use procureflix_ai::AdvisoryKind;
use procureflix_core::NumberPrefix;

/// Whether a transition is decided by one actor or recorded as a gate vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// A single actor decides.
    Single,
    /// The actor casts a vote on a parallel gate.
    Parallel(GateName),
}

/// Destinations for a single-actor decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionRoutes {
    pub approved: Status,
    pub approved_with_conditions: Option<Status>,
    pub rejected: Status,
    pub returned: Option<Status>,
}

impl DecisionRoutes {
    /// Returns the destination for a decision, if this transition accepts it.
    #[must_use]
    pub fn route(&self, decision: Decision) -> Option<Status> {
        match decision {
            Decision::Pending => None,
            Decision::Approved => Some(self.approved),
            Decision::ApprovedWithConditions => self.approved_with_conditions,
            Decision::Rejected => Some(self.rejected),
            Decision::Returned => self.returned,
        }
    }
}

/// Destinations for a gate once it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRoutes {
    pub all_approved: Status,
    pub any_rejected: Status,
    pub any_returned: Status,
}

impl GateRoutes {
    /// Returns the destination for an outcome; `None` while the gate is pending.
    #[must_use]
    pub fn route(&self, outcome: GateOutcome) -> Option<Status> {
        match outcome {
            GateOutcome::Pending => None,
            GateOutcome::AllApproved => Some(self.all_approved),
            GateOutcome::AnyRejected => Some(self.any_rejected),
            GateOutcome::AnyReturned => Some(self.any_returned),
        }
    }
}

/// How a transition picks its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Always the same status.
    Fixed(Status),
    /// Chosen by `payload.decision`.
    Decision(DecisionRoutes),
    /// A vote on a parallel gate, routed by the gate's resolution.
    Gate(GateName, GateRoutes),
    /// Chosen by `payload.target_status` among the listed options.
    Choice(Vec<Status>),
}

/// A data precondition checked after role and state checks pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// `payload.notes` must be non-blank.
    NotesRequired,
    /// An assessment of this kind must be attached.
    AdvisoryRequired(AdvisoryKind),
    /// A high vendor risk needs a recorded risk acceptance before entering `on`.
    RiskAcceptanceForHighRisk { on: Status },
}

/// Who receives a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// The entity's creator.
    Creator,
    /// Everyone seated on a gate.
    GateAssignees(GateName),
    /// Every actor holding a role.
    Role(Role),
}

/// Work triggered by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Best-effort notification, dispatched after commit.
    Notify {
        recipients: Recipients,
        message: String,
    },
    /// Create the downstream contract for an awarded business request.
    AutoProvisionContract,
    /// Allocate a year-scoped number into an attribute before commit.
    AllocateNumber {
        prefix: NumberPrefix,
        attribute: &'static str,
    },
}

/// When a side effect fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTrigger {
    /// Every time the transition succeeds.
    Always,
    /// Only when the transition moves the entity into this status.
    Entering(Status),
}

impl EffectTrigger {
    /// Returns true if the trigger fires for a move from `from` to `to`.
    #[must_use]
    pub fn fires(&self, from: Status, to: Status) -> bool {
        match self {
            Self::Always => true,
            Self::Entering(status) => *status == to && from != to,
        }
    }
}

/// One row of a workflow's transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Name callers use to request the transition.
    pub name: &'static str,
    /// Eligible source states.
    pub from: Vec<Status>,
    /// Destination rule.
    pub target: Target,
    /// Roles allowed to request it.
    pub allowed_roles: Vec<Role>,
    /// Payload fields copied into the entity's attributes.
    pub captures: Vec<&'static str>,
    /// Data preconditions.
    pub guards: Vec<Guard>,
    /// Advisory assessment to obtain and summarize in the audit notes.
    pub advisory: Option<AdvisoryKind>,
    /// Side effects.
    pub effects: Vec<(EffectTrigger, SideEffect)>,
}

impl Transition {
    /// Creates a transition with no sources, no roles and a fixed target of `draft`.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            from: Vec::new(),
            target: Target::Fixed(Status::Draft),
            allowed_roles: Vec::new(),
            captures: Vec::new(),
            guards: Vec::new(),
            advisory: None,
            effects: Vec::new(),
        }
    }

    /// Sets the source states.
    #[must_use]
    pub fn from(mut self, states: &[Status]) -> Self {
        self.from = states.to_vec();
        self
    }

    /// Sets a fixed destination.
    #[must_use]
    pub fn to(mut self, status: Status) -> Self {
        self.target = Target::Fixed(status);
        self
    }

    /// Routes by the actor's decision.
    #[must_use]
    pub fn decide(mut self, routes: DecisionRoutes) -> Self {
        self.target = Target::Decision(routes);
        self
    }

    /// Makes this a vote on `gate`, routed by the gate's resolution.
    #[must_use]
    pub fn vote(mut self, gate: GateName, routes: GateRoutes) -> Self {
        self.target = Target::Gate(gate, routes);
        self
    }

    /// Lets the caller choose among `options`.
    #[must_use]
    pub fn choose(mut self, options: &[Status]) -> Self {
        self.target = Target::Choice(options.to_vec());
        self
    }

    /// Sets the allowed roles.
    #[must_use]
    pub fn allow(mut self, roles: &[Role]) -> Self {
        self.allowed_roles = roles.to_vec();
        self
    }

    /// Copies these payload fields into the entity's attributes.
    #[must_use]
    pub fn capture(mut self, fields: &[&'static str]) -> Self {
        self.captures.extend_from_slice(fields);
        self
    }

    /// Adds a guard.
    #[must_use]
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Declares the advisory assessment this transition consumes.
    #[must_use]
    pub fn advisory(mut self, kind: AdvisoryKind) -> Self {
        self.advisory = Some(kind);
        self
    }

    /// Adds a side effect.
    #[must_use]
    pub fn effect(mut self, trigger: EffectTrigger, effect: SideEffect) -> Self {
        self.effects.push((trigger, effect));
        self
    }

    /// Returns whether this is a single decision or a gate vote.
    #[must_use]
    pub fn gate(&self) -> GateKind {
        match self.target {
            Target::Gate(gate, _) => GateKind::Parallel(gate),
            _ => GateKind::Single,
        }
    }

    /// Returns true if the transition can leave from `status`.
    #[must_use]
    pub fn leaves_from(&self, status: Status) -> bool {
        self.from.contains(&status)
    }

    /// Returns true if `role` may request the transition.
    #[must_use]
    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }

    /// Every status this transition can lead to.
    #[must_use]
    pub fn destinations(&self) -> Vec<Status> {
        match &self.target {
            Target::Fixed(status) => vec![*status],
            Target::Decision(routes) => [
                Some(routes.approved),
                routes.approved_with_conditions,
                Some(routes.rejected),
                routes.returned,
            ]
            .into_iter()
            .flatten()
            .collect(),
            Target::Gate(_, routes) => vec![
                routes.all_approved,
                routes.any_rejected,
                routes.any_returned,
            ],
            Target::Choice(options) => options.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop_routes() -> DecisionRoutes {
        DecisionRoutes {
            approved: Status::Approved,
            approved_with_conditions: None,
            rejected: Status::Rejected,
            returned: Some(Status::ReturnedForRevision),
        }
    }

    #[test]
    fn decision_routes() {
        let routes = hop_routes();
        assert_eq!(routes.route(Decision::Approved), Some(Status::Approved));
        assert_eq!(routes.route(Decision::ApprovedWithConditions), None);
        assert_eq!(routes.route(Decision::Pending), None);
        assert_eq!(
            routes.route(Decision::Returned),
            Some(Status::ReturnedForRevision)
        );
    }

    #[test]
    fn entering_trigger_needs_status_change() {
        let trigger = EffectTrigger::Entering(Status::Awarded);
        assert!(trigger.fires(Status::PendingHopApproval, Status::Awarded));
        assert!(!trigger.fires(Status::Awarded, Status::Awarded));
        assert!(!trigger.fires(Status::PendingHopApproval, Status::Rejected));
        assert!(EffectTrigger::Always.fires(Status::PendingReview, Status::PendingReview));
    }

    #[test]
    fn builder_sets_vote() {
        let transition = Transition::new("review_decide")
            .from(&[Status::PendingReview])
            .vote(
                GateName::Reviewers,
                GateRoutes {
                    all_approved: Status::ReviewComplete,
                    any_rejected: Status::ReturnedForRevision,
                    any_returned: Status::ReturnedForRevision,
                },
            )
            .allow(&[Role::ProcurementManager]);

        assert_eq!(transition.gate(), GateKind::Parallel(GateName::Reviewers));
        assert!(transition.leaves_from(Status::PendingReview));
        assert!(!transition.permits(Role::Vendor));
        assert!(transition.destinations().contains(&Status::ReviewComplete));
    }

    #[test]
    fn decision_destinations_skip_unused_routes() {
        let transition = Transition::new("hop_decide").decide(hop_routes());
        assert_eq!(
            transition.destinations(),
            vec![
                Status::Approved,
                Status::Rejected,
                Status::ReturnedForRevision
            ]
        );
    }
}
