//! Workflow definitions.
//!
//! A definition is the transition table for one entity type, plus the
//! parallel gates the workflow uses and notifications tied to arriving in a
//! status regardless of which transition got there.

use crate::gate::{GateName, GatePolicy};
use crate::status::{EntityType, Status};
use crate::transition::{EffectTrigger, Recipients, SideEffect, Transition};
use procureflix_access::Role;
use std::collections::BTreeSet;

/// A parallel gate used by a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSpec {
    /// Gate name.
    pub name: GateName,
    /// How decisions combine.
    pub policy: GatePolicy,
    /// Status the entity waits in while the gate is open.
    pub pending_status: Status,
}

/// The complete transition table for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDefinition {
    /// Entity type this table applies to.
    pub entity_type: EntityType,
    /// Status new entities start in.
    pub initial: Status,
    /// Statuses with no way out.
    pub terminal: Vec<Status>,
    /// Roles allowed to create entities of this type.
    pub creators: Vec<Role>,
    /// Parallel gates.
    pub gates: Vec<GateSpec>,
    /// Transitions, in table order.
    pub transitions: Vec<Transition>,
    /// Effects fired whenever the entity arrives in a status.
    pub arrivals: Vec<(Status, SideEffect)>,
}

impl WorkflowDefinition {
    /// Creates an empty definition.
    #[must_use]
    pub fn new(entity_type: EntityType, initial: Status) -> Self {
        Self {
            entity_type,
            initial,
            terminal: Vec::new(),
            creators: Vec::new(),
            gates: Vec::new(),
            transitions: Vec::new(),
            arrivals: Vec::new(),
        }
    }

    /// Sets the terminal statuses.
    #[must_use]
    pub fn with_terminal(mut self, statuses: &[Status]) -> Self {
        self.terminal = statuses.to_vec();
        self
    }

    /// Sets the roles that may create entities.
    #[must_use]
    pub fn with_creators(mut self, roles: &[Role]) -> Self {
        self.creators = roles.to_vec();
        self
    }

    /// Adds a parallel gate.
    #[must_use]
    pub fn with_gate(mut self, name: GateName, policy: GatePolicy, pending_status: Status) -> Self {
        self.gates.push(GateSpec {
            name,
            policy,
            pending_status,
        });
        self
    }

    /// Adds a transition.
    #[must_use]
    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Notifies `recipients` whenever the entity arrives in `status`.
    #[must_use]
    pub fn notify_on_entry(
        mut self,
        status: Status,
        recipients: Recipients,
        message: impl Into<String>,
    ) -> Self {
        self.arrivals.push((
            status,
            SideEffect::Notify {
                recipients,
                message: message.into(),
            },
        ));
        self
    }

    /// Looks up a transition by name.
    #[must_use]
    pub fn transition(&self, name: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.name == name)
    }

    /// Looks up a gate.
    #[must_use]
    pub fn gate(&self, name: GateName) -> Option<&GateSpec> {
        self.gates.iter().find(|g| g.name == name)
    }

    /// Returns the gate that is open while the entity waits in `status`.
    #[must_use]
    pub fn gate_pending_in(&self, status: Status) -> Option<&GateSpec> {
        self.gates.iter().find(|g| g.pending_status == status)
    }

    /// Returns true if `status` is terminal.
    #[must_use]
    pub fn is_terminal(&self, status: Status) -> bool {
        self.terminal.contains(&status)
    }

    /// Names of every transition in the table.
    #[must_use]
    pub fn transition_names(&self) -> Vec<String> {
        self.transitions.iter().map(|t| t.name.to_string()).collect()
    }

    /// Transitions `role` may request from `status`.
    #[must_use]
    pub fn available(&self, status: Status, role: Role) -> BTreeSet<&'static str> {
        self.transitions
            .iter()
            .filter(|t| t.leaves_from(status) && t.permits(role))
            .map(|t| t.name)
            .collect()
    }

    /// Every status the workflow uses.
    #[must_use]
    pub fn states(&self) -> BTreeSet<Status> {
        let mut states = BTreeSet::from([self.initial]);
        states.extend(self.terminal.iter().copied());
        for transition in &self.transitions {
            states.extend(transition.from.iter().copied());
            states.extend(transition.destinations());
        }
        states
    }

    /// Every non-terminal status, minus `except`.
    #[must_use]
    pub fn open_states_except(&self, except: &[Status]) -> Vec<Status> {
        self.states()
            .into_iter()
            .filter(|s| !self.is_terminal(*s) && !except.contains(s))
            .collect()
    }

    /// Effects fired by arriving in `to` from `from`.
    pub fn arrival_effects(
        &self,
        from: Status,
        to: Status,
    ) -> impl Iterator<Item = &SideEffect> + '_ {
        self.arrivals
            .iter()
            .filter(move |(status, _)| EffectTrigger::Entering(*status).fires(from, to))
            .map(|(_, effect)| effect)
    }
}
