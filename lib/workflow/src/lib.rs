//! Approval workflow state machine for procureflix.
//!
//! This crate provides the approval engine shared by every procurement
//! workflow:
//!
//! - **Entities**: the documents moving through a workflow, with audit trail and links
//! - **Transitions**: declarative tables of sources, roles, guards and side effects
//! - **Gates**: parallel review and approval rounds with all-of / any-of resolution
//! - **Definitions**: business request, contract governance, vendor due diligence, deliverable
//! - **Provisioning**: idempotent creation of a contract when a request is awarded
//!
//! Everything here is synchronous and free of I/O. Persistence, numbering
//! and notification dispatch belong to the caller.

pub mod definition;
pub mod definitions;
pub mod engine;
pub mod entity;
pub mod error;
pub mod gate;
pub mod payload;
pub mod provisioning;
pub mod status;
pub mod transition;

pub use definition::{GateSpec, WorkflowDefinition};
pub use engine::{TransitionOutcome, WorkflowEngine};
pub use entity::{AUTO_CREATED_CONTRACT, AuditEntry, RiskAcceptance, WorkflowEntity};
pub use error::WorkflowError;
pub use gate::{Decision, GateName, GateOutcome, GatePolicy, RoleAssignment};
pub use payload::TransitionPayload;
pub use provisioning::Provisioned;
pub use status::{EntityType, Status};
pub use transition::{
    DecisionRoutes, EffectTrigger, GateKind, GateRoutes, Guard, Recipients, SideEffect, Target,
    Transition,
};
