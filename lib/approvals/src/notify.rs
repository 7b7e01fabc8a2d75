//! Notification sink.
//!
//! Notifications are best-effort. The service dispatches them after the
//! transition is committed and reports failures without undoing anything.

use async_trait::async_trait;
use procureflix_core::{EntityId, UserId};
use procureflix_workflow::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::info;

/// "Notify user X about item Y".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Who to notify.
    pub recipient: UserId,
    /// Type of the item.
    pub entity_type: EntityType,
    /// The item.
    pub entity_id: EntityId,
    /// Human-readable message.
    pub message: String,
}

/// Errors from notification delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The sink could not deliver the notification.
    DeliveryFailed { recipient: UserId, reason: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeliveryFailed { recipient, reason } => {
                write!(f, "could not notify {recipient}: {reason}")
            }
        }
    }
}

impl std::error::Error for NotifyError {}

/// Accepts notifications for delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            entity_type = %notification.entity_type,
            entity_id = %notification.entity_id,
            message = %notification.message,
            "notification"
        );
        Ok(())
    }
}

/// Sink that keeps every notification in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationSink {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns what one user received.
    #[must_use]
    pub fn sent_to(&self, recipient: UserId) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.recipient == recipient)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(())
    }
}
