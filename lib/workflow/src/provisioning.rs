//! Auto-provisioning of downstream contracts.
//!
//! When a business request is awarded, a contract is created from it in
//! `pending_completion`. The hook is idempotent: once the source carries an
//! [`AUTO_CREATED_CONTRACT`] link, it returns that id and creates nothing.

use crate::definitions::business_request::SELECTED_VENDOR;
use crate::entity::{AUTO_CREATED_CONTRACT, WorkflowEntity};
use crate::error::WorkflowError;
use crate::payload::TransitionPayload;
use crate::status::{EntityType, Status};
use chrono::{DateTime, Utc};
use procureflix_access::Actor;
use procureflix_core::EntityId;
use serde_json::Value as JsonValue;

/// Attribute on a business request holding its budget.
pub const BUDGET: &str = "budget";

/// Attribute on a business request recording the winning vendor.
pub const AWARDED_TO: &str = "awarded_to";

/// Link on a provisioned contract back to its business request.
pub const SOURCE_BUSINESS_REQUEST: &str = "source_business_request_id";

/// Result of running the hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Provisioned {
    /// A new contract to insert alongside the source.
    Created(WorkflowEntity),
    /// The source was already linked to this contract.
    Existing(EntityId),
}

impl Provisioned {
    /// Returns the linked contract's id.
    #[must_use]
    pub fn contract_id(&self) -> EntityId {
        match self {
            Self::Created(contract) => contract.id(),
            Self::Existing(id) => *id,
        }
    }
}

/// Creates the contract for an awarded business request.
///
/// The vendor comes from `payload.award_vendor_id`, falling back to the
/// vendor recorded with the selected proposal. Without either the hook fails
/// with [`WorkflowError::NoAwardTarget`] and the caller must discard the
/// whole transition.
pub fn provision_contract(
    source: &mut WorkflowEntity,
    actor: &Actor,
    payload: &TransitionPayload,
    at: DateTime<Utc>,
) -> Result<Provisioned, WorkflowError> {
    if let Some(existing) = source.linked_entity(AUTO_CREATED_CONTRACT) {
        return Ok(Provisioned::Existing(existing));
    }

    let vendor_id = payload
        .award_vendor_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| source.attribute_str(SELECTED_VENDOR))
        .map(str::to_string)
        .ok_or(WorkflowError::NoAwardTarget {
            entity_id: source.id(),
        })?;

    let br_number = source
        .number
        .clone()
        .unwrap_or_else(|| source.id().to_string());
    let value = source
        .attributes
        .get(BUDGET)
        .cloned()
        .unwrap_or(JsonValue::Null);

    let mut contract = WorkflowEntity::new(
        EntityType::Contract,
        Status::PendingCompletion,
        format!("Contract for {}", source.title),
        actor.id,
    )
    .with_attribute("created_from_br", JsonValue::Bool(true))
    .with_attribute("br_number", JsonValue::String(br_number.clone()))
    .with_attribute("value", value)
    .with_attribute("vendor_id", JsonValue::String(vendor_id.clone()));
    if let Some(proposal) = source.attributes.get("selected_proposal_id") {
        contract
            .attributes
            .insert("selected_proposal_id".to_string(), proposal.clone());
    }
    contract.link_once(SOURCE_BUSINESS_REQUEST, source.id());
    contract.touch(at);
    let entry = contract.audit_entry(
        "auto_provision",
        actor,
        Status::PendingCompletion,
        at,
        Some(format!("created from business request {br_number}")),
    );
    contract.append_audit(entry);

    source
        .attributes
        .insert(AWARDED_TO.to_string(), JsonValue::String(vendor_id));
    source.link_once(AUTO_CREATED_CONTRACT, contract.id());

    Ok(Provisioned::Created(contract))
}
