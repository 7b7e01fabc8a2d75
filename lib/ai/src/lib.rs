//! AI advisory for procurement approvals.
//!
//! The approval engine treats AI output as advisory data: a payment
//! readiness verdict for deliverables and a risk level for vendor due
//! diligence. This crate provides:
//!
//! - **Advisory types**: the verdicts and the assessment record attached to entities
//! - **`AiAdvisory`**: the collaborator contract the approval service calls
//! - **`LlmAdvisor`**: an advisor backed by any [`LlmBackend`], with JSON-parsing fallbacks
//! - **`HttpLlmBackend`**: an OpenAI-compatible chat completions client

pub mod advisory;
pub mod backend;
pub mod error;
pub mod http;
pub mod parse;

pub use advisory::{
    AdvisoryAssessment, AdvisoryFinding, AdvisoryKind, AiAdvisory, LlmAdvisor, PaymentReadiness,
    RiskLevel,
};
pub use backend::{LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse, TokenUsage};
pub use error::{AdvisoryError, LlmError};
pub use http::HttpLlmBackend;
