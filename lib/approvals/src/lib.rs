//! Approval service for the procureflix workflows.
//!
//! Wraps the pure workflow engine with storage, optimistic concurrency,
//! number allocation, AI advisory attachment and notification dispatch.

pub mod config;
pub mod error;
pub mod notify;
pub mod service;

pub use config::ApprovalConfig;
pub use error::ApprovalError;
pub use notify::{
    InMemoryNotificationSink, Notification, NotificationSink, NotifyError, TracingNotificationSink,
};
pub use service::{ApprovalService, GateAssignment, TransitionReport, TransitionRequest};
