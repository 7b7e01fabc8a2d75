//! Approval service settings.

use serde::{Deserialize, Serialize};

/// Tuning for the read-decide-write loop and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Attempts before giving up on a contended entity.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Tell the creator when a gate vote is recorded but the gate is still open.
    #[serde(default = "default_notify_on_gate_progress")]
    pub notify_on_gate_progress: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_notify_on_gate_progress() -> bool {
    true
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            notify_on_gate_progress: default_notify_on_gate_progress(),
        }
    }
}
