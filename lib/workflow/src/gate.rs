//! Parallel approval gates.
//!
//! A gate is a named set of role assignments on an entity (the reviewers or
//! the approvers). Each assignee decides once; the gate resolves from the
//! recorded decisions.

use chrono::{DateTime, Utc};
use procureflix_access::Actor;
use procureflix_core::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a parallel gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    /// Review gate.
    Reviewers,
    /// Approval gate.
    Approvers,
}

impl GateName {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reviewers => "reviewers",
            Self::Approvers => "approvers",
        }
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GateName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reviewers" => Ok(Self::Reviewers),
            "approvers" => Ok(Self::Approvers),
            _ => Err(format!("unknown gate: {s}")),
        }
    }
}

/// How a gate's decisions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Every assignee must approve.
    AllOf,
    /// One approval is enough.
    AnyOf,
}

/// A decision on a gate or a single-actor decision transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Pending,
    Approved,
    ApprovedWithConditions,
    Rejected,
    Returned,
}

impl Decision {
    /// Returns true for both plain and conditional approval.
    #[must_use]
    pub fn is_approval(&self) -> bool {
        matches!(self, Self::Approved | Self::ApprovedWithConditions)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::ApprovedWithConditions => "approved_with_conditions",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
        };
        f.write_str(s)
    }
}

/// One assignee's seat on a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// The gate this seat belongs to.
    pub gate: GateName,
    /// Assigned user.
    pub actor_id: UserId,
    /// Assigned user's display name at assignment time.
    pub actor_name: String,
    /// Role label at assignment time.
    pub role_label: String,
    /// The assignee's decision, `Pending` until they act.
    pub decision: Decision,
    /// When the decision was recorded.
    pub decided_at: Option<DateTime<Utc>>,
    /// Notes given with the decision.
    pub notes: Option<String>,
}

impl RoleAssignment {
    /// Creates a pending seat for an actor.
    #[must_use]
    pub fn pending(gate: GateName, actor: &Actor) -> Self {
        Self {
            gate,
            actor_id: actor.id,
            actor_name: actor.display_name.clone(),
            role_label: actor.role.label().to_string(),
            decision: Decision::Pending,
            decided_at: None,
            notes: None,
        }
    }

    /// Records a decision on this seat.
    pub fn decide(&mut self, decision: Decision, notes: Option<String>, at: DateTime<Utc>) {
        self.decision = decision;
        self.notes = notes;
        self.decided_at = Some(at);
    }

    /// Puts the seat back to pending, keeping the assignee.
    pub fn reset(&mut self) {
        self.decision = Decision::Pending;
        self.notes = None;
        self.decided_at = None;
    }
}

/// Resolution of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    /// Waiting on further decisions.
    Pending,
    /// The gate's approval condition is met.
    AllApproved,
    /// At least one assignee rejected.
    AnyRejected,
    /// Everyone has decided and at least one returned the item.
    AnyReturned,
}

/// Resolves a gate from its assignments.
///
/// A rejection vetoes immediately, even while other seats are still pending.
/// Under `AllOf`, a return resolves only once every other seat has decided.
/// Under `AnyOf`, the first approval satisfies the gate. A gate with no
/// seats is pending.
#[must_use]
pub fn resolve(assignments: &[RoleAssignment], gate: GateName, policy: GatePolicy) -> GateOutcome {
    let decisions: Vec<Decision> = assignments
        .iter()
        .filter(|a| a.gate == gate)
        .map(|a| a.decision)
        .collect();

    if decisions.is_empty() {
        return GateOutcome::Pending;
    }
    if decisions.contains(&Decision::Rejected) {
        return GateOutcome::AnyRejected;
    }

    let any_pending = decisions.contains(&Decision::Pending);
    let any_returned = decisions.contains(&Decision::Returned);
    let any_approved = decisions.iter().any(Decision::is_approval);

    match policy {
        GatePolicy::AllOf => {
            if any_pending {
                GateOutcome::Pending
            } else if any_returned {
                GateOutcome::AnyReturned
            } else {
                GateOutcome::AllApproved
            }
        }
        GatePolicy::AnyOf => {
            if any_approved {
                GateOutcome::AllApproved
            } else if any_pending {
                GateOutcome::Pending
            } else {
                GateOutcome::AnyReturned
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procureflix_access::Role;

    fn seats(decisions: &[Decision]) -> Vec<RoleAssignment> {
        decisions
            .iter()
            .map(|d| {
                let mut seat = RoleAssignment::pending(
                    GateName::Approvers,
                    &Actor::new(Role::ProcurementManager, "manager"),
                );
                if *d != Decision::Pending {
                    seat.decide(*d, None, Utc::now());
                }
                seat
            })
            .collect()
    }

    const GATE_DECISIONS: [Decision; 4] = [
        Decision::Pending,
        Decision::Approved,
        Decision::Rejected,
        Decision::Returned,
    ];

    fn every_combination(size: usize) -> Vec<Vec<Decision>> {
        let mut combos = vec![Vec::new()];
        for _ in 0..size {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    GATE_DECISIONS.into_iter().map(move |d| {
                        let mut next = prefix.clone();
                        next.push(d);
                        next
                    })
                })
                .collect();
        }
        combos
    }

    #[test]
    fn any_rejected_iff_some_rejection() {
        for size in 1..=4 {
            for combo in every_combination(size) {
                let has_rejection = combo.contains(&Decision::Rejected);
                for policy in [GatePolicy::AllOf, GatePolicy::AnyOf] {
                    let outcome = resolve(&seats(&combo), GateName::Approvers, policy);
                    assert_eq!(
                        outcome == GateOutcome::AnyRejected,
                        has_rejection,
                        "{combo:?} under {policy:?} resolved to {outcome:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn all_of_requires_every_approval() {
        for size in 1..=4 {
            for combo in every_combination(size) {
                let outcome = resolve(&seats(&combo), GateName::Approvers, GatePolicy::AllOf);
                let all_approved = combo.iter().all(|d| *d == Decision::Approved);
                assert_eq!(outcome == GateOutcome::AllApproved, all_approved, "{combo:?}");
            }
        }
    }

    #[test]
    fn all_of_return_waits_for_remaining_seats() {
        let outcome = resolve(
            &seats(&[Decision::Returned, Decision::Pending]),
            GateName::Approvers,
            GatePolicy::AllOf,
        );
        assert_eq!(outcome, GateOutcome::Pending);

        let outcome = resolve(
            &seats(&[Decision::Returned, Decision::Approved]),
            GateName::Approvers,
            GatePolicy::AllOf,
        );
        assert_eq!(outcome, GateOutcome::AnyReturned);
    }

    #[test]
    fn any_of_first_approval_wins() {
        let outcome = resolve(
            &seats(&[Decision::Pending, Decision::Approved, Decision::Returned]),
            GateName::Approvers,
            GatePolicy::AnyOf,
        );
        assert_eq!(outcome, GateOutcome::AllApproved);
    }

    #[test]
    fn empty_gate_is_pending() {
        assert_eq!(
            resolve(&[], GateName::Reviewers, GatePolicy::AllOf),
            GateOutcome::Pending
        );
    }

    #[test]
    fn other_gates_are_ignored() {
        let mut assignments = seats(&[Decision::Rejected]);
        assignments[0].gate = GateName::Reviewers;
        assignments.extend(seats(&[Decision::Approved]));

        assert_eq!(
            resolve(&assignments, GateName::Approvers, GatePolicy::AllOf),
            GateOutcome::AllApproved
        );
    }

    #[test]
    fn reset_clears_decision() {
        let mut seat = seats(&[Decision::Returned]).remove(0);
        seat.reset();
        assert_eq!(seat.decision, Decision::Pending);
        assert!(seat.decided_at.is_none());
    }
}
