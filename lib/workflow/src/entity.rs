//! Workflow entities.
//!
//! A `WorkflowEntity` is the document the engine reads and rewrites. Its
//! identity, creator and audit trail are only reachable through accessors:
//! status changes and audit entries come from the engine alone.

use crate::gate::{GateName, RoleAssignment};
use crate::status::{EntityType, Status};
use chrono::{DateTime, Utc};
use procureflix_access::Actor;
use procureflix_ai::AdvisoryAssessment;
use procureflix_core::{EntityId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Link name for the contract created when a business request is awarded.
pub const AUTO_CREATED_CONTRACT: &str = "auto_created_contract_id";

/// One immutable audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Transition or operation name.
    pub action: String,
    /// Who performed it.
    pub actor_id: UserId,
    /// Display name of the actor at the time.
    pub actor_name: String,
    /// Status before the action.
    pub from_status: Status,
    /// Status after the action.
    pub to_status: Status,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// Free-form notes, including advisory summaries.
    pub notes: Option<String>,
}

/// Accepted risk for a high-risk vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAcceptance {
    /// Why the risk is accepted.
    pub reason: String,
    /// Controls that mitigate the risk.
    pub mitigating_controls: Vec<String>,
    /// Who accepted it.
    pub accepted_by: UserId,
    /// When it was accepted.
    pub accepted_at: DateTime<Utc>,
}

/// A business object moving through an approval workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEntity {
    id: EntityId,
    entity_type: EntityType,
    status: Status,
    /// Optimistic concurrency token, owned by the entity store.
    pub version: u64,
    /// Human-facing document number, e.g. `BR-2026-0012`.
    pub number: Option<String>,
    /// Short title.
    pub title: String,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Seats on the entity's parallel gates.
    #[serde(default)]
    pub role_assignments: Vec<RoleAssignment>,
    #[serde(default)]
    audit_trail: Vec<AuditEntry>,
    #[serde(default)]
    linked_entity_ids: BTreeMap<String, EntityId>,
    /// Workflow-specific document fields (budget, selected vendor, ...).
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
    #[serde(default)]
    advisory: Option<AdvisoryAssessment>,
    #[serde(default)]
    risk_acceptance: Option<RiskAcceptance>,
    #[serde(default)]
    exported: bool,
}

impl WorkflowEntity {
    /// Creates an entity in the given initial status.
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        initial_status: Status,
        title: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            entity_type,
            status: initial_status,
            version: 0,
            number: None,
            title: title.into(),
            created_by,
            created_at: now,
            updated_at: now,
            role_assignments: Vec::new(),
            audit_trail: Vec::new(),
            linked_entity_ids: BTreeMap::new(),
            attributes: Map::new(),
            advisory: None,
            risk_acceptance: None,
            exported: false,
        }
    }

    /// Sets a document attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Returns the entity ID.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns which workflow this entity follows.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns who created the entity.
    #[must_use]
    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    /// Returns when the entity was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the entity last changed.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the audit trail, oldest first.
    #[must_use]
    pub fn audit_trail(&self) -> &[AuditEntry] {
        &self.audit_trail
    }

    /// Returns every link to a downstream entity.
    #[must_use]
    pub fn linked_entity_ids(&self) -> &BTreeMap<String, EntityId> {
        &self.linked_entity_ids
    }

    /// Returns a named link to a downstream entity.
    #[must_use]
    pub fn linked_entity(&self, name: &str) -> Option<EntityId> {
        self.linked_entity_ids.get(name).copied()
    }

    /// Returns the advisory assessment, if one is attached.
    #[must_use]
    pub fn advisory(&self) -> Option<&AdvisoryAssessment> {
        self.advisory.as_ref()
    }

    /// Attaches an advisory assessment, replacing any earlier one.
    pub fn attach_advisory(&mut self, assessment: AdvisoryAssessment) {
        self.advisory = Some(assessment);
    }

    /// Returns the recorded risk acceptance.
    #[must_use]
    pub fn risk_acceptance(&self) -> Option<&RiskAcceptance> {
        self.risk_acceptance.as_ref()
    }

    /// Returns true once a deliverable has been exported for payment.
    #[must_use]
    pub fn is_exported(&self) -> bool {
        self.exported
    }

    /// Returns a string attribute.
    #[must_use]
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(JsonValue::as_str)
    }

    /// Returns the seats of one gate.
    pub fn gate_assignments(&self, gate: GateName) -> impl Iterator<Item = &RoleAssignment> {
        self.role_assignments.iter().filter(move |a| a.gate == gate)
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    pub(crate) fn append_audit(&mut self, entry: AuditEntry) {
        self.audit_trail.push(entry);
    }

    /// Sets a link unless it is already set; returns the link's value.
    pub(crate) fn link_once(&mut self, name: &str, id: EntityId) -> EntityId {
        *self.linked_entity_ids.entry(name.to_string()).or_insert(id)
    }

    pub(crate) fn set_risk_acceptance(&mut self, acceptance: RiskAcceptance) {
        self.risk_acceptance = Some(acceptance);
    }

    /// Drops the assessment and any acceptance given against it.
    pub(crate) fn clear_assessment(&mut self) {
        self.advisory = None;
        self.risk_acceptance = None;
    }

    pub(crate) fn set_exported(&mut self) {
        self.exported = true;
    }

    /// Builds an audit entry for an action by `actor` moving to `to_status`.
    pub(crate) fn audit_entry(
        &self,
        action: &str,
        actor: &Actor,
        to_status: Status,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> AuditEntry {
        AuditEntry {
            action: action.to_string(),
            actor_id: actor.id,
            actor_name: actor.display_name.clone(),
            from_status: self.status,
            to_status,
            timestamp: at,
            notes,
        }
    }
}
