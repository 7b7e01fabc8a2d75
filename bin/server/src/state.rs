//! Shared application state.

use crate::config::ServerConfig;
use procureflix_access::InMemoryActorDirectory;
use procureflix_ai::{HttpLlmBackend, LlmAdvisor, LlmError};
use procureflix_approvals::{ApprovalService, TracingNotificationSink};
use procureflix_store::{InMemoryCounterStore, InMemoryEntityStore, SequenceAllocator};
use std::sync::Arc;

/// State handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The approval service.
    pub service: Arc<ApprovalService>,
}

impl AppState {
    /// Wraps an existing service.
    #[must_use]
    pub fn new(service: ApprovalService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Builds the demo deployment: in-memory stores, configured actors,
    /// notifications to the log and an optional LLM advisor.
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM backend configuration is invalid.
    pub fn from_config(config: &ServerConfig) -> Result<Self, LlmError> {
        let directory: InMemoryActorDirectory =
            config.actors.iter().map(|seed| seed.to_actor()).collect();
        for seed in &config.actors {
            if seed.id.is_none() {
                tracing::warn!(
                    display_name = %seed.display_name,
                    "actor has no configured id; it gets a fresh one on every start"
                );
            }
        }

        let mut service = ApprovalService::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(directory),
            Arc::new(TracingNotificationSink),
            SequenceAllocator::new(Arc::new(InMemoryCounterStore::new())),
        )
        .with_config(config.approvals.clone());

        if let Some(llm) = &config.llm {
            tracing::info!(model = %llm.model, "advisory assessments enabled");
            let backend = HttpLlmBackend::new(llm.clone())?;
            service = service.with_advisory(Arc::new(LlmAdvisor::new(backend)));
        }

        Ok(Self::new(service))
    }
}
