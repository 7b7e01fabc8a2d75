//! The workflow engine.
//!
//! The engine is pure: it takes the current entity and returns the entity as
//! it should be persisted, or an error. It never mutates its input, so a
//! rejected request leaves the caller's copy exactly as it was loaded.
//!
//! `apply_transition` checks, in order, that the transition exists, that the
//! entity is in an eligible source state, that the actor's role is allowed
//! and, for gate votes, that the actor holds an undecided seat. Only then are
//! payload, guards and side effects evaluated.

use crate::definition::WorkflowDefinition;
use crate::definitions;
use crate::entity::{RiskAcceptance, WorkflowEntity};
use crate::error::WorkflowError;
use crate::gate::{self, Decision, GateName, GateOutcome, RoleAssignment};
use crate::payload::TransitionPayload;
use crate::provisioning::{self, Provisioned};
use crate::status::{EntityType, Status};
use crate::transition::{Guard, SideEffect, Target, Transition};
use chrono::Utc;
use procureflix_access::{Actor, Role};
use procureflix_ai::{AdvisoryAssessment, RiskLevel};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Roles that may seat assignees on a gate.
const GATE_ORGANIZERS: &[Role] = &[
    Role::ProcurementOfficer,
    Role::HeadOfProcurement,
    Role::Admin,
];

/// Roles that may record a risk acceptance.
const RISK_ACCEPTORS: &[Role] = &[
    Role::ProcurementOfficer,
    Role::HeadOfProcurement,
    Role::Admin,
];

/// Roles that may flag a deliverable as exported.
const EXPORTERS: &[Role] = &[
    Role::ProcurementOfficer,
    Role::HeadOfProcurement,
    Role::Admin,
];

/// The result of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// The entity to persist.
    pub entity: WorkflowEntity,
    /// Status before the transition.
    pub previous_status: Status,
    /// Gate resolution after a vote.
    pub gate_outcome: Option<GateOutcome>,
    /// Downstream entity linked by auto-provisioning.
    pub provisioned: Option<Provisioned>,
    /// Effects left for the caller: number allocation before the write,
    /// notifications after it.
    pub effects: Vec<SideEffect>,
}

impl TransitionOutcome {
    /// Returns true if the transition moved the entity to a new status.
    #[must_use]
    pub fn status_changed(&self) -> bool {
        self.entity.status() != self.previous_status
    }
}

/// Table-driven state machine over every registered entity type.
#[derive(Debug, Clone, Default)]
pub struct WorkflowEngine {
    definitions: HashMap<EntityType, WorkflowDefinition>,
}

impl WorkflowEngine {
    /// Creates an engine with no workflows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the four procurement workflows.
    #[must_use]
    pub fn standard() -> Self {
        definitions::standard()
            .into_iter()
            .fold(Self::new(), Self::with_definition)
    }

    /// Registers a definition, replacing any for the same entity type.
    #[must_use]
    pub fn with_definition(mut self, definition: WorkflowDefinition) -> Self {
        self.register(definition);
        self
    }

    /// Registers a definition, replacing any for the same entity type.
    pub fn register(&mut self, definition: WorkflowDefinition) {
        self.definitions.insert(definition.entity_type, definition);
    }

    /// Returns the definition for an entity type.
    #[must_use]
    pub fn definition(&self, entity_type: EntityType) -> Option<&WorkflowDefinition> {
        self.definitions.get(&entity_type)
    }

    /// Looks up a transition.
    #[must_use]
    pub fn transition(&self, entity_type: EntityType, name: &str) -> Option<&Transition> {
        self.definition(entity_type)?.transition(name)
    }

    /// Transitions `role` may request on an entity in `status`.
    #[must_use]
    pub fn available_transitions(
        &self,
        entity_type: EntityType,
        status: Status,
        role: Role,
    ) -> BTreeSet<&'static str> {
        self.definition(entity_type)
            .map(|d| d.available(status, role))
            .unwrap_or_default()
    }

    /// Creates a new entity in its workflow's initial status.
    pub fn create(
        &self,
        entity_type: EntityType,
        title: &str,
        actor: &Actor,
        attributes: Map<String, JsonValue>,
    ) -> Result<WorkflowEntity, WorkflowError> {
        let definition = self.require(entity_type, "create")?;
        if !definition.creators.contains(&actor.role) {
            return Err(WorkflowError::Forbidden {
                transition: "create".to_string(),
                role: actor.role,
                allowed_roles: definition.creators.clone(),
            });
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(WorkflowError::invalid_payload("title", "must not be empty"));
        }

        let mut entity = WorkflowEntity::new(entity_type, definition.initial, title, actor.id);
        entity.attributes = attributes;
        let entry = entity.audit_entry("create", actor, definition.initial, entity.created_at(), None);
        entity.append_audit(entry);
        Ok(entity)
    }

    /// Applies a named transition on behalf of `actor`.
    ///
    /// `assignees` seats a gate when the transition opens one; when empty, an
    /// existing gate is reset for another round instead.
    pub fn apply_transition(
        &self,
        entity: &WorkflowEntity,
        transition_name: &str,
        actor: &Actor,
        payload: &TransitionPayload,
        assignees: &[Actor],
    ) -> Result<TransitionOutcome, WorkflowError> {
        let definition = self.require(entity.entity_type(), transition_name)?;
        let transition = definition.transition(transition_name).ok_or_else(|| {
            WorkflowError::UnknownTransition {
                entity_type: entity.entity_type(),
                transition: transition_name.to_string(),
                available: definition.transition_names(),
            }
        })?;

        let current = entity.status();
        if !transition.leaves_from(current) {
            return Err(WorkflowError::InvalidStateTransition {
                transition: transition.name.to_string(),
                current,
                allowed_from: transition.from.clone(),
            });
        }
        if !transition.permits(actor.role) {
            return Err(WorkflowError::Forbidden {
                transition: transition.name.to_string(),
                role: actor.role,
                allowed_roles: transition.allowed_roles.clone(),
            });
        }

        let now = Utc::now();
        let mut working = entity.clone();
        let mut gate_outcome = None;

        let target = match &transition.target {
            Target::Fixed(status) => *status,
            Target::Decision(routes) => {
                let decision = required_decision(payload)?;
                routes.route(decision).ok_or_else(|| {
                    WorkflowError::invalid_payload(
                        "decision",
                        format!("'{decision}' is not accepted by {}", transition.name),
                    )
                })?
            }
            Target::Gate(gate, routes) => {
                let seat = open_seat(&working, *gate, actor)?;
                let decision = required_decision(payload)?;
                if decision == Decision::Pending {
                    return Err(WorkflowError::invalid_payload(
                        "decision",
                        "a vote cannot be 'pending'",
                    ));
                }
                let policy = definition
                    .gate(*gate)
                    .map(|spec| spec.policy)
                    .ok_or(WorkflowError::UnknownGate {
                        entity_type: entity.entity_type(),
                        gate: *gate,
                    })?;
                working.role_assignments[seat].decide(
                    decision,
                    payload.non_empty_notes().map(str::to_string),
                    now,
                );
                let outcome = gate::resolve(&working.role_assignments, *gate, policy);
                gate_outcome = Some(outcome);
                routes.route(outcome).unwrap_or(current)
            }
            Target::Choice(options) => {
                let listed = options
                    .iter()
                    .map(Status::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                let chosen = payload.target_status.ok_or_else(|| {
                    WorkflowError::invalid_payload("target_status", format!("choose one of: {listed}"))
                })?;
                if !options.contains(&chosen) {
                    return Err(WorkflowError::invalid_payload(
                        "target_status",
                        format!("'{chosen}' is not one of: {listed}"),
                    ));
                }
                chosen
            }
        };

        check_guards(&working, transition, payload, target)?;

        for field in &transition.captures {
            if let Some(value) = payload.fields.get(*field) {
                working.attributes.insert((*field).to_string(), value.clone());
            }
        }

        if target != current {
            if let Some(spec) = definition.gate_pending_in(target) {
                open_gate(&mut working, spec.name, assignees)?;
            }
        }

        let entry = working.audit_entry(
            transition.name,
            actor,
            target,
            now,
            audit_notes(&working, transition, payload),
        );
        working.set_status(target);
        working.touch(now);
        if target == Status::ReturnedForRevision && current != target {
            // A revised submission gets assessed afresh.
            working.clear_assessment();
        }

        let mut provisioned = None;
        let mut effects = Vec::new();
        for (trigger, effect) in &transition.effects {
            if !trigger.fires(current, target) {
                continue;
            }
            match effect {
                SideEffect::AutoProvisionContract => {
                    provisioned = Some(provisioning::provision_contract(
                        &mut working,
                        actor,
                        payload,
                        now,
                    )?);
                }
                other => effects.push(other.clone()),
            }
        }
        effects.extend(definition.arrival_effects(current, target).cloned());

        working.append_audit(entry);

        Ok(TransitionOutcome {
            entity: working,
            previous_status: current,
            gate_outcome,
            provisioned,
            effects,
        })
    }

    /// Seats `assignees` on a gate, replacing its previous seats.
    pub fn assign_parallel_gate(
        &self,
        entity: &WorkflowEntity,
        gate: GateName,
        assignees: &[Actor],
        actor: &Actor,
    ) -> Result<WorkflowEntity, WorkflowError> {
        let action = format!("assign_{gate}");
        let definition = self.require(entity.entity_type(), &action)?;
        if definition.gate(gate).is_none() {
            return Err(WorkflowError::UnknownGate {
                entity_type: entity.entity_type(),
                gate,
            });
        }
        if definition.is_terminal(entity.status()) {
            return Err(WorkflowError::TerminalEntity {
                entity_id: entity.id(),
                status: entity.status(),
            });
        }
        if !GATE_ORGANIZERS.contains(&actor.role) {
            return Err(WorkflowError::Forbidden {
                transition: action,
                role: actor.role,
                allowed_roles: GATE_ORGANIZERS.to_vec(),
            });
        }
        if assignees.is_empty() {
            return Err(WorkflowError::EmptyAssigneeList { gate });
        }

        let now = Utc::now();
        let mut working = entity.clone();
        replace_seats(&mut working, gate, assignees);
        let names = working
            .gate_assignments(gate)
            .map(|a| a.actor_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let entry = working.audit_entry(&action, actor, working.status(), now, Some(names));
        working.append_audit(entry);
        working.touch(now);
        Ok(working)
    }

    /// Resolves a gate from the entity's current seats.
    pub fn resolve_gate(
        &self,
        entity: &WorkflowEntity,
        gate: GateName,
    ) -> Result<GateOutcome, WorkflowError> {
        let spec = self
            .definition(entity.entity_type())
            .and_then(|d| d.gate(gate))
            .ok_or(WorkflowError::UnknownGate {
                entity_type: entity.entity_type(),
                gate,
            })?;
        Ok(gate::resolve(&entity.role_assignments, gate, spec.policy))
    }

    /// Records why a high-risk vendor is accepted anyway.
    pub fn record_risk_acceptance(
        &self,
        entity: &WorkflowEntity,
        reason: &str,
        mitigating_controls: &[String],
        actor: &Actor,
    ) -> Result<WorkflowEntity, WorkflowError> {
        let definition = self.expect_type(entity, EntityType::VendorDd, "record_risk_acceptance")?;
        if definition.is_terminal(entity.status()) {
            return Err(WorkflowError::TerminalEntity {
                entity_id: entity.id(),
                status: entity.status(),
            });
        }
        if !RISK_ACCEPTORS.contains(&actor.role) {
            return Err(WorkflowError::Forbidden {
                transition: "record_risk_acceptance".to_string(),
                role: actor.role,
                allowed_roles: RISK_ACCEPTORS.to_vec(),
            });
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::invalid_payload("reason", "must not be empty"));
        }
        let controls: Vec<String> = mitigating_controls
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if controls.is_empty() {
            return Err(WorkflowError::invalid_payload(
                "mitigating_controls",
                "name at least one control",
            ));
        }

        let now = Utc::now();
        let mut working = entity.clone();
        working.set_risk_acceptance(RiskAcceptance {
            reason: reason.to_string(),
            mitigating_controls: controls,
            accepted_by: actor.id,
            accepted_at: now,
        });
        let entry = working.audit_entry(
            "record_risk_acceptance",
            actor,
            working.status(),
            now,
            Some(reason.to_string()),
        );
        working.append_audit(entry);
        working.touch(now);
        Ok(working)
    }

    /// Flags an approved or paid deliverable as exported for payment.
    ///
    /// Exporting twice is a no-op.
    pub fn mark_exported(
        &self,
        entity: &WorkflowEntity,
        actor: &Actor,
    ) -> Result<WorkflowEntity, WorkflowError> {
        self.expect_type(entity, EntityType::Deliverable, "mark_exported")?;
        if !EXPORTERS.contains(&actor.role) {
            return Err(WorkflowError::Forbidden {
                transition: "mark_exported".to_string(),
                role: actor.role,
                allowed_roles: EXPORTERS.to_vec(),
            });
        }
        if !matches!(entity.status(), Status::Approved | Status::Paid) {
            return Err(WorkflowError::NotExportable {
                entity_id: entity.id(),
                status: entity.status(),
            });
        }
        if entity.is_exported() {
            return Ok(entity.clone());
        }

        let now = Utc::now();
        let mut working = entity.clone();
        working.set_exported();
        let entry = working.audit_entry("mark_exported", actor, working.status(), now, None);
        working.append_audit(entry);
        working.touch(now);
        Ok(working)
    }

    fn require(
        &self,
        entity_type: EntityType,
        action: &str,
    ) -> Result<&WorkflowDefinition, WorkflowError> {
        self.definition(entity_type)
            .ok_or_else(|| WorkflowError::UnknownTransition {
                entity_type,
                transition: action.to_string(),
                available: Vec::new(),
            })
    }

    fn expect_type(
        &self,
        entity: &WorkflowEntity,
        expected: EntityType,
        action: &str,
    ) -> Result<&WorkflowDefinition, WorkflowError> {
        if entity.entity_type() != expected {
            return Err(WorkflowError::EntityTypeMismatch {
                expected,
                actual: entity.entity_type(),
            });
        }
        self.require(expected, action)
    }
}

fn required_decision(payload: &TransitionPayload) -> Result<Decision, WorkflowError> {
    payload
        .decision
        .ok_or_else(|| WorkflowError::invalid_payload("decision", "a decision is required"))
}

/// Finds the actor's undecided seat on a gate.
fn open_seat(entity: &WorkflowEntity, gate: GateName, actor: &Actor) -> Result<usize, WorkflowError> {
    let index = entity
        .role_assignments
        .iter()
        .position(|a| a.gate == gate && a.actor_id == actor.id)
        .ok_or(WorkflowError::NotAnAssignee {
            gate,
            actor_id: actor.id,
        })?;
    let decision = entity.role_assignments[index].decision;
    if decision != Decision::Pending {
        return Err(WorkflowError::AlreadyDecided {
            gate,
            actor_id: actor.id,
            decision,
        });
    }
    Ok(index)
}

fn check_guards(
    entity: &WorkflowEntity,
    transition: &Transition,
    payload: &TransitionPayload,
    target: Status,
) -> Result<(), WorkflowError> {
    for guard in &transition.guards {
        match guard {
            Guard::NotesRequired => {
                if payload.non_empty_notes().is_none() {
                    return Err(WorkflowError::invalid_payload(
                        "notes",
                        format!("{} needs a justification", transition.name),
                    ));
                }
            }
            Guard::AdvisoryRequired(kind) => {
                if entity.advisory().map(AdvisoryAssessment::kind) != Some(*kind) {
                    return Err(WorkflowError::MissingAdvisoryAssessment {
                        entity_id: entity.id(),
                        kind: *kind,
                    });
                }
            }
            Guard::RiskAcceptanceForHighRisk { on } => {
                let high_risk = entity.advisory().and_then(AdvisoryAssessment::risk_level)
                    == Some(RiskLevel::High);
                if target == *on && high_risk && entity.risk_acceptance().is_none() {
                    return Err(WorkflowError::MissingRiskAcceptance {
                        entity_id: entity.id(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Opens a gate for a new round.
fn open_gate(
    entity: &mut WorkflowEntity,
    gate: GateName,
    assignees: &[Actor],
) -> Result<(), WorkflowError> {
    if !assignees.is_empty() {
        replace_seats(entity, gate, assignees);
        return Ok(());
    }
    let mut seated = false;
    for seat in entity.role_assignments.iter_mut().filter(|a| a.gate == gate) {
        seat.reset();
        seated = true;
    }
    if seated {
        Ok(())
    } else {
        Err(WorkflowError::EmptyAssigneeList { gate })
    }
}

fn replace_seats(entity: &mut WorkflowEntity, gate: GateName, assignees: &[Actor]) {
    entity.role_assignments.retain(|a| a.gate != gate);
    let mut seen = HashSet::new();
    for assignee in assignees {
        if seen.insert(assignee.id) {
            entity
                .role_assignments
                .push(RoleAssignment::pending(gate, assignee));
        }
    }
}

fn audit_notes(
    entity: &WorkflowEntity,
    transition: &Transition,
    payload: &TransitionPayload,
) -> Option<String> {
    let notes = payload.non_empty_notes().map(str::to_string);
    let summary = transition.advisory.and_then(|kind| {
        entity
            .advisory()
            .filter(|a| a.kind() == kind)
            .map(AdvisoryAssessment::summary)
    });
    match (notes, summary) {
        (Some(notes), Some(summary)) => Some(format!("{notes}\n{summary}")),
        (notes, summary) => notes.or(summary),
    }
}
