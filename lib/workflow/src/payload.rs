//! Transition payloads.

use crate::gate::Decision;
use crate::status::Status;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Transition-specific input supplied by the caller.
///
/// Well-known fields are typed; anything else lands in `fields` and can be
/// captured into the entity's attributes by transitions that declare it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionPayload {
    /// Free-form notes recorded on the audit entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Decision for gate votes and HoP decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// Vendor to award a business request to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award_vendor_id: Option<String>,
    /// Destination for transitions that offer a choice (`re_forward`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_status: Option<Status>,
    /// Any other fields.
    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
}

impl TransitionPayload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Adds a decision.
    #[must_use]
    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Names the vendor to award to.
    #[must_use]
    pub fn with_award_vendor(mut self, vendor_id: impl Into<String>) -> Self {
        self.award_vendor_id = Some(vendor_id.into());
        self
    }

    /// Chooses the destination status.
    #[must_use]
    pub fn with_target(mut self, status: Status) -> Self {
        self.target_status = Some(status);
        self
    }

    /// Adds an extra field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns the notes if they contain anything besides whitespace.
    #[must_use]
    pub fn non_empty_notes(&self) -> Option<&str> {
        self.notes.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}
