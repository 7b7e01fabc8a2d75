//! HTTP error responses.
//!
//! Each approval error kind maps to one status code. Store and directory
//! details are logged, not returned.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use procureflix_approvals::ApprovalError;
use procureflix_workflow::WorkflowError;
use rootcause::Report;
use serde_json::json;
use std::fmt;

/// Errors returned by the HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The service refused or failed the request.
    Approval(ApprovalError),
    /// No `x-actor-id` header.
    MissingActor,
    /// A path segment or header could not be parsed.
    BadRequest { reason: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approval(err) => write!(f, "{err}"),
            Self::MissingActor => write!(f, "the x-actor-id header is required"),
            Self::BadRequest { reason } => write!(f, "bad request: {reason}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<Report<ApprovalError>> for ApiError {
    fn from(report: Report<ApprovalError>) -> Self {
        Self::Approval(report.current_context().clone())
    }
}

fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::UnknownTransition { .. }
        | WorkflowError::InvalidPayload { .. }
        | WorkflowError::UnknownGate { .. }
        | WorkflowError::EntityTypeMismatch { .. }
        | WorkflowError::EmptyAssigneeList { .. } => StatusCode::BAD_REQUEST,
        WorkflowError::Forbidden { .. } | WorkflowError::NotAnAssignee { .. } => {
            StatusCode::FORBIDDEN
        }
        WorkflowError::InvalidStateTransition { .. }
        | WorkflowError::AlreadyDecided { .. }
        | WorkflowError::NoAwardTarget { .. }
        | WorkflowError::MissingRiskAcceptance { .. }
        | WorkflowError::MissingAdvisoryAssessment { .. }
        | WorkflowError::NotExportable { .. }
        | WorkflowError::TerminalEntity { .. } => StatusCode::CONFLICT,
    }
}

impl ApiError {
    /// The status code this error is reported with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Approval(err) => match err {
                ApprovalError::Workflow(err) => workflow_status(err),
                ApprovalError::NotFound { .. } => StatusCode::NOT_FOUND,
                ApprovalError::UnknownActor { .. } => StatusCode::FORBIDDEN,
                ApprovalError::ConcurrentModification { .. } => StatusCode::CONFLICT,
                ApprovalError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                ApprovalError::Directory { .. } | ApprovalError::Advisory { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::MissingActor => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Approval(ApprovalError::Store { reason }) => {
                tracing::error!(%reason, "store failure");
                "internal error".to_string()
            }
            Self::Approval(ApprovalError::Directory { reason }) => {
                tracing::error!(%reason, "actor directory failure");
                "actor directory unavailable".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
