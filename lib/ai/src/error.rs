//! Failures from model backends and from the advisor built on them.

use crate::advisory::AdvisoryKind;
use std::fmt;

/// A model call that did not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Transport failure or a non-success status.
    RequestFailed { reason: String },
    /// The body was not a chat completion.
    ResponseParseFailed { reason: String },
    /// No answer within the configured timeout.
    Timeout,
    /// The provider answered 429.
    RateLimited { retry_after_secs: Option<u64> },
    /// Settings that cannot produce a client.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => write!(f, "model call failed: {reason}"),
            Self::ResponseParseFailed { reason } => {
                write!(f, "unreadable model response: {reason}")
            }
            Self::Timeout => write!(f, "model call timed out"),
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => write!(f, "rate limited, retry after {secs}s"),
            Self::RateLimited {
                retry_after_secs: None,
            } => write!(f, "rate limited"),
            Self::InvalidConfig { reason } => write!(f, "bad model backend settings: {reason}"),
        }
    }
}

impl std::error::Error for LlmError {}

/// An assessment the advisor could not produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryError {
    /// The backend call failed.
    Backend { kind: AdvisoryKind, source: LlmError },
    /// The model answered, but no verdict could be recovered from the answer.
    UnparseableResponse { kind: AdvisoryKind, excerpt: String },
}

impl fmt::Display for AdvisoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { kind, source } => {
                write!(f, "{kind} assessment failed: {source}")
            }
            Self::UnparseableResponse { kind, excerpt } => {
                write!(f, "no {kind} verdict in model response: {excerpt}")
            }
        }
    }
}

impl std::error::Error for AdvisoryError {}
