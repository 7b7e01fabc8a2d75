//! The approval service.
//!
//! Every write is a read-decide-write cycle against the entity store: load
//! the entity, let the engine decide, run the pre-commit side effects
//! (number allocation, contract provisioning), then compare-and-swap on the
//! version that was read. A lost swap re-runs the whole cycle against the
//! fresh entity, so a gate vote is always evaluated against the latest seats.
//! Notifications go out only after the write has landed.

use crate::config::ApprovalConfig;
use crate::error::ApprovalError;
use crate::notify::{Notification, NotificationSink};
use chrono::{Datelike, Utc};
use procureflix_access::{Actor, ActorDirectory};
use procureflix_ai::{AdvisoryAssessment, AiAdvisory};
use procureflix_core::{EntityId, NumberPrefix, UserId};
use procureflix_store::{EntityStore, SequenceAllocator};
use procureflix_workflow::{
    EntityType, GateName, GateOutcome, Guard, Provisioned, Recipients, SideEffect, Status,
    TransitionOutcome, TransitionPayload, WorkflowEngine, WorkflowEntity, WorkflowError,
};
use rootcause::Report;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A request to apply a named transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    /// Type of the entity.
    pub entity_type: EntityType,
    /// The entity.
    pub entity_id: EntityId,
    /// Transition name, e.g. `hop_decide`.
    pub transition: String,
    /// Who is asking.
    pub actor_id: UserId,
    /// Decision, notes and captured fields.
    pub payload: TransitionPayload,
    /// Seats for a gate this transition opens.
    pub target_assignees: Vec<UserId>,
}

impl TransitionRequest {
    /// Creates a request with an empty payload.
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        entity_id: EntityId,
        transition: impl Into<String>,
        actor_id: UserId,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            transition: transition.into(),
            actor_id,
            payload: TransitionPayload::new(),
            target_assignees: Vec::new(),
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: TransitionPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the gate assignees.
    #[must_use]
    pub fn with_assignees(mut self, assignees: impl IntoIterator<Item = UserId>) -> Self {
        self.target_assignees = assignees.into_iter().collect();
        self
    }
}

/// What a committed transition did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionReport {
    /// The entity as stored.
    pub entity: WorkflowEntity,
    /// Status before the transition.
    pub previous_status: Status,
    /// Gate resolution after a vote.
    pub gate_outcome: Option<GateOutcome>,
    /// Contract created or found by auto-provisioning.
    pub provisioned_contract: Option<EntityId>,
    /// Read-decide-write cycles it took.
    pub attempts: u32,
    /// Notifications delivered.
    pub notifications_sent: usize,
    /// Side effects that failed after commit.
    pub failed_side_effects: Vec<String>,
}

/// A gate seated by [`ApprovalService::assign_parallel_gate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateAssignment {
    /// The entity as stored.
    pub entity: WorkflowEntity,
    /// Assignees told about their seat.
    pub notifications_sent: usize,
    /// Notifications that could not be delivered.
    pub failed_side_effects: Vec<String>,
}

/// Loads, decides and commits workflow transitions.
#[derive(Clone)]
pub struct ApprovalService {
    engine: WorkflowEngine,
    store: Arc<dyn EntityStore>,
    directory: Arc<dyn ActorDirectory>,
    notifier: Arc<dyn NotificationSink>,
    advisory: Option<Arc<dyn AiAdvisory>>,
    sequences: SequenceAllocator,
    config: ApprovalConfig,
}

impl std::fmt::Debug for ApprovalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalService")
            .field("engine", &self.engine)
            .field("advisory", &self.advisory.is_some())
            .field("sequences", &self.sequences)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Number prefix given to an entity when it is created.
fn creation_prefix(entity_type: EntityType) -> Option<NumberPrefix> {
    match entity_type {
        EntityType::BusinessRequest => Some(NumberPrefix::BusinessRequest),
        EntityType::Contract => Some(NumberPrefix::Contract),
        EntityType::VendorDd | EntityType::Deliverable => None,
    }
}

fn current_year() -> i32 {
    Utc::now().year()
}

impl ApprovalService {
    /// Creates a service running the standard workflows.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        directory: Arc<dyn ActorDirectory>,
        notifier: Arc<dyn NotificationSink>,
        sequences: SequenceAllocator,
    ) -> Self {
        Self {
            engine: WorkflowEngine::standard(),
            store,
            directory,
            notifier,
            advisory: None,
            sequences,
            config: ApprovalConfig::default(),
        }
    }

    /// Sets the AI advisor consulted by advisory transitions.
    #[must_use]
    pub fn with_advisory(mut self, advisory: Arc<dyn AiAdvisory>) -> Self {
        self.advisory = Some(advisory);
        self
    }

    /// Sets retry and notification settings.
    #[must_use]
    pub fn with_config(mut self, config: ApprovalConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the engine.
    #[must_use]
    pub fn with_engine(mut self, engine: WorkflowEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Creates and stores a new entity, numbering it where its type is numbered.
    #[instrument(skip_all, fields(%entity_type, %actor_id))]
    pub async fn create(
        &self,
        entity_type: EntityType,
        title: &str,
        actor_id: UserId,
        attributes: Map<String, JsonValue>,
    ) -> Result<WorkflowEntity, Report<ApprovalError>> {
        let actor = self.resolve_actor(actor_id).await?;
        let mut entity = self
            .engine
            .create(entity_type, title, &actor, attributes)
            .map_err(ApprovalError::from)?;
        if let Some(prefix) = creation_prefix(entity_type) {
            let number = self
                .sequences
                .next(prefix, current_year())
                .await
                .map_err(ApprovalError::from)?;
            entity.number = Some(number.to_string());
        }
        self.store
            .insert(&entity)
            .await
            .map_err(ApprovalError::from)?;
        info!(entity_id = %entity.id(), status = %entity.status(), "entity created");
        Ok(entity)
    }

    /// Loads an entity.
    pub async fn get(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<WorkflowEntity, Report<ApprovalError>> {
        self.load(entity_type, entity_id).await
    }

    /// Lists every entity of a type, oldest first.
    pub async fn list(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<WorkflowEntity>, Report<ApprovalError>> {
        Ok(self
            .store
            .list(entity_type)
            .await
            .map_err(ApprovalError::from)?)
    }

    /// Transitions the actor may request on the entity right now.
    pub async fn available_transitions(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        actor_id: UserId,
    ) -> Result<BTreeSet<&'static str>, Report<ApprovalError>> {
        let actor = self.resolve_actor(actor_id).await?;
        let entity = self.load(entity_type, entity_id).await?;
        Ok(self
            .engine
            .available_transitions(entity_type, entity.status(), actor.role))
    }

    /// Resolves a gate from the stored seats.
    pub async fn resolve_gate(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        gate: GateName,
    ) -> Result<GateOutcome, Report<ApprovalError>> {
        let entity = self.load(entity_type, entity_id).await?;
        Ok(self
            .engine
            .resolve_gate(&entity, gate)
            .map_err(ApprovalError::from)?)
    }

    /// Applies a transition, retrying the cycle when another writer wins.
    #[instrument(
        skip_all,
        fields(
            entity_type = %request.entity_type,
            entity_id = %request.entity_id,
            transition = %request.transition,
        )
    )]
    pub async fn apply_transition(
        &self,
        request: &TransitionRequest,
    ) -> Result<TransitionReport, Report<ApprovalError>> {
        let actor = self.resolve_actor(request.actor_id).await?;
        let assignees = self.resolve_actors(&request.target_assignees).await?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut assessment = None;

        for attempt in 1..=max_attempts {
            let loaded = self.load(request.entity_type, request.entity_id).await?;
            let mut entity = loaded.clone();
            if let Some(fresh) = self
                .obtain_advisory(&entity, &request.transition, &actor, assessment.take())
                .await?
            {
                entity.attach_advisory(fresh.clone());
                assessment = Some(fresh);
            }

            let TransitionOutcome {
                entity: mut decided,
                previous_status,
                gate_outcome,
                provisioned,
                effects,
            } = self
                .engine
                .apply_transition(
                    &entity,
                    &request.transition,
                    &actor,
                    &request.payload,
                    &assignees,
                )
                .map_err(ApprovalError::from)?;
            debug!(attempt, from = %previous_status, to = %decided.status(), "decided");

            let notifications = self.allocate_numbers(&mut decided, effects).await?;
            let (provisioned_contract, inserted) = match provisioned {
                Some(Provisioned::Created(contract)) => {
                    let id = self.insert_contract(contract).await?;
                    (Some(id), Some(id))
                }
                Some(Provisioned::Existing(id)) => (Some(id), None),
                None => (None, None),
            };

            let swapped = self
                .store
                .compare_and_swap(request.entity_type, request.entity_id, loaded.version, &decided)
                .await;
            let committed = match swapped {
                Ok(committed) => committed,
                Err(err) => {
                    if let Some(contract_id) = inserted {
                        self.discard_contract(contract_id).await;
                    }
                    return Err(ApprovalError::from(err).into());
                }
            };
            if committed {
                decided.version = loaded.version + 1;
                info!(
                    attempt,
                    from = %previous_status,
                    to = %decided.status(),
                    version = decided.version,
                    "transition committed"
                );
                let (notifications_sent, failed_side_effects) = self
                    .dispatch(&decided, &actor, &notifications, gate_outcome)
                    .await;
                return Ok(TransitionReport {
                    entity: decided,
                    previous_status,
                    gate_outcome,
                    provisioned_contract,
                    attempts: attempt,
                    notifications_sent,
                    failed_side_effects,
                });
            }

            if let Some(contract_id) = inserted {
                self.discard_contract(contract_id).await;
            }
            warn!(attempt, max_attempts, "entity changed since it was read, retrying");
        }

        Err(ApprovalError::ConcurrentModification {
            entity_id: request.entity_id,
            attempts: max_attempts,
        }
        .into())
    }

    /// Seats assignees on a gate and tells them.
    #[instrument(skip_all, fields(%entity_type, %entity_id, %gate))]
    pub async fn assign_parallel_gate(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        gate: GateName,
        assignee_ids: &[UserId],
        actor_id: UserId,
    ) -> Result<GateAssignment, Report<ApprovalError>> {
        let actor = self.resolve_actor(actor_id).await?;
        let assignees = self.resolve_actors(assignee_ids).await?;
        let entity = self
            .update(entity_type, entity_id, |entity| {
                self.engine
                    .assign_parallel_gate(entity, gate, &assignees, &actor)
            })
            .await?;

        let recipients: BTreeSet<UserId> =
            entity.gate_assignments(gate).map(|a| a.actor_id).collect();
        let message = format!("{}: you have a {gate} decision to make", label(&entity));
        let mut notifications_sent = 0;
        let mut failed_side_effects = Vec::new();
        for recipient in recipients {
            match self.send(&entity, recipient, &message).await {
                Ok(()) => notifications_sent += 1,
                Err(reason) => failed_side_effects.push(reason),
            }
        }
        Ok(GateAssignment {
            entity,
            notifications_sent,
            failed_side_effects,
        })
    }

    /// Records a risk acceptance on a vendor due diligence.
    #[instrument(skip_all, fields(%entity_id, %actor_id))]
    pub async fn record_risk_acceptance(
        &self,
        entity_id: EntityId,
        reason: &str,
        mitigating_controls: &[String],
        actor_id: UserId,
    ) -> Result<WorkflowEntity, Report<ApprovalError>> {
        let actor = self.resolve_actor(actor_id).await?;
        self.update(EntityType::VendorDd, entity_id, |entity| {
            self.engine
                .record_risk_acceptance(entity, reason, mitigating_controls, &actor)
        })
        .await
    }

    /// Flags a deliverable as exported for payment.
    #[instrument(skip_all, fields(%entity_id, %actor_id))]
    pub async fn mark_exported(
        &self,
        entity_id: EntityId,
        actor_id: UserId,
    ) -> Result<WorkflowEntity, Report<ApprovalError>> {
        let actor = self.resolve_actor(actor_id).await?;
        self.update(EntityType::Deliverable, entity_id, |entity| {
            self.engine.mark_exported(entity, &actor)
        })
        .await
    }

    async fn load(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<WorkflowEntity, Report<ApprovalError>> {
        let entity = self
            .store
            .load(entity_type, entity_id)
            .await
            .map_err(ApprovalError::from)?;
        Ok(entity.ok_or(ApprovalError::NotFound {
            entity_type,
            entity_id,
        })?)
    }

    async fn resolve_actor(&self, actor_id: UserId) -> Result<Actor, Report<ApprovalError>> {
        Ok(self
            .directory
            .resolve(actor_id)
            .await
            .map_err(ApprovalError::from)?)
    }

    async fn resolve_actors(&self, ids: &[UserId]) -> Result<Vec<Actor>, Report<ApprovalError>> {
        let mut actors = Vec::with_capacity(ids.len());
        for id in ids {
            actors.push(self.resolve_actor(*id).await?);
        }
        Ok(actors)
    }

    /// Read-decide-write for operations that do not change status.
    async fn update<F>(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        decide: F,
    ) -> Result<WorkflowEntity, Report<ApprovalError>>
    where
        F: Fn(&WorkflowEntity) -> Result<WorkflowEntity, WorkflowError> + Send + Sync,
    {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let loaded = self.load(entity_type, entity_id).await?;
            let mut decided = decide(&loaded).map_err(ApprovalError::from)?;
            if decided == loaded {
                return Ok(loaded);
            }
            let committed = self
                .store
                .compare_and_swap(entity_type, entity_id, loaded.version, &decided)
                .await
                .map_err(ApprovalError::from)?;
            if committed {
                decided.version = loaded.version + 1;
                info!(attempt, version = decided.version, "entity updated");
                return Ok(decided);
            }
            warn!(attempt, max_attempts, "entity changed since it was read, retrying");
        }
        Err(ApprovalError::ConcurrentModification {
            entity_id,
            attempts: max_attempts,
        }
        .into())
    }

    /// Asks the advisor for an assessment when the transition declares one
    /// and the entity has none of that kind.
    ///
    /// The request must already pass the state and role checks, so the
    /// advisor is never consulted for a request the engine would refuse.
    async fn obtain_advisory(
        &self,
        entity: &WorkflowEntity,
        transition_name: &str,
        actor: &Actor,
        cached: Option<AdvisoryAssessment>,
    ) -> Result<Option<AdvisoryAssessment>, Report<ApprovalError>> {
        let Some(transition) = self.engine.transition(entity.entity_type(), transition_name) else {
            return Ok(None);
        };
        let Some(kind) = transition.advisory else {
            return Ok(None);
        };
        if !transition.leaves_from(entity.status()) || !transition.permits(actor.role) {
            return Ok(None);
        }
        if entity.advisory().is_some_and(|a| a.kind() == kind) {
            return Ok(None);
        }
        if let Some(cached) = cached.filter(|a| a.kind() == kind) {
            return Ok(Some(cached));
        }
        let Some(advisor) = &self.advisory else {
            debug!(%kind, "no advisor configured");
            return Ok(None);
        };

        let snapshot = serde_json::to_value(entity).map_err(snapshot_failure)?;
        match advisor.assess(kind, &snapshot).await {
            Ok(assessment) => {
                info!(%kind, summary = %assessment.summary(), "advisory assessment attached");
                Ok(Some(assessment))
            }
            Err(report) if transition.guards.contains(&Guard::AdvisoryRequired(kind)) => {
                Err(ApprovalError::Advisory {
                    reason: report.current_context().to_string(),
                }
                .into())
            }
            Err(report) => {
                warn!(%kind, error = %report.current_context(), "advisory unavailable, continuing without it");
                Ok(None)
            }
        }
    }

    /// Allocates numbers into attributes and hands back what is left.
    async fn allocate_numbers(
        &self,
        entity: &mut WorkflowEntity,
        effects: Vec<SideEffect>,
    ) -> Result<Vec<SideEffect>, Report<ApprovalError>> {
        let mut remaining = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                SideEffect::AllocateNumber { prefix, attribute } => {
                    if entity.attribute_str(attribute).is_some() {
                        continue;
                    }
                    let number = self
                        .sequences
                        .next(prefix, current_year())
                        .await
                        .map_err(ApprovalError::from)?;
                    debug!(%number, attribute, "number allocated");
                    entity
                        .attributes
                        .insert(attribute.to_string(), JsonValue::String(number.to_string()));
                }
                other => remaining.push(other),
            }
        }
        Ok(remaining)
    }

    async fn insert_contract(
        &self,
        mut contract: WorkflowEntity,
    ) -> Result<EntityId, Report<ApprovalError>> {
        let number = self
            .sequences
            .next(NumberPrefix::Contract, current_year())
            .await
            .map_err(ApprovalError::from)?;
        contract.number = Some(number.to_string());
        self.store
            .insert(&contract)
            .await
            .map_err(ApprovalError::from)?;
        debug!(contract_id = %contract.id(), %number, "contract provisioned");
        Ok(contract.id())
    }

    async fn discard_contract(&self, contract_id: EntityId) {
        match self.store.delete(EntityType::Contract, contract_id).await {
            Ok(_) => debug!(%contract_id, "discarded contract from lost write"),
            Err(err) => warn!(%contract_id, error = %err, "could not discard orphaned contract"),
        }
    }

    /// Sends post-commit notifications; failures are logged and listed.
    async fn dispatch(
        &self,
        entity: &WorkflowEntity,
        actor: &Actor,
        effects: &[SideEffect],
        gate_outcome: Option<GateOutcome>,
    ) -> (usize, Vec<String>) {
        let mut sent = 0;
        let mut failed = Vec::new();

        let mut messages: Vec<(Recipients, String)> = effects
            .iter()
            .filter_map(|effect| match effect {
                SideEffect::Notify {
                    recipients,
                    message,
                } => Some((*recipients, format!("{}: {message}", label(entity)))),
                _ => None,
            })
            .collect();
        if gate_outcome == Some(GateOutcome::Pending) && self.config.notify_on_gate_progress {
            messages.push((
                Recipients::Creator,
                format!(
                    "{}: {} recorded a decision, waiting on the others",
                    label(entity),
                    actor.display_name
                ),
            ));
        }

        for (recipients, message) in messages {
            let users = match self.recipients(entity, recipients).await {
                Ok(users) => users,
                Err(err) => {
                    warn!(?recipients, error = %err, "could not resolve recipients");
                    failed.push(format!("notify {recipients:?}: {err}"));
                    continue;
                }
            };
            for user in users {
                match self.send(entity, user, &message).await {
                    Ok(()) => sent += 1,
                    Err(reason) => failed.push(reason),
                }
            }
        }
        (sent, failed)
    }

    async fn recipients(
        &self,
        entity: &WorkflowEntity,
        recipients: Recipients,
    ) -> Result<BTreeSet<UserId>, ApprovalError> {
        Ok(match recipients {
            Recipients::Creator => BTreeSet::from([entity.created_by()]),
            Recipients::GateAssignees(gate) => {
                entity.gate_assignments(gate).map(|a| a.actor_id).collect()
            }
            Recipients::Role(role) => self
                .directory
                .members_with_role(role)
                .await?
                .into_iter()
                .map(|a| a.id)
                .collect(),
        })
    }

    async fn send(
        &self,
        entity: &WorkflowEntity,
        recipient: UserId,
        message: &str,
    ) -> Result<(), String> {
        let notification = Notification {
            recipient,
            entity_type: entity.entity_type(),
            entity_id: entity.id(),
            message: message.to_string(),
        };
        self.notifier.notify(&notification).await.map_err(|err| {
            warn!(%recipient, error = %err, "notification failed");
            err.to_string()
        })
    }
}

fn snapshot_failure(err: serde_json::Error) -> ApprovalError {
    ApprovalError::Advisory {
        reason: format!("could not snapshot entity for assessment: {err}"),
    }
}

/// How an entity is named in messages.
fn label(entity: &WorkflowEntity) -> String {
    match &entity.number {
        Some(number) => format!("{number} {}", entity.title),
        None => entity.title.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{InMemoryNotificationSink, NotifyError};
    use async_trait::async_trait;
    use procureflix_access::{InMemoryActorDirectory, Role};
    use procureflix_ai::{AdvisoryError, AdvisoryKind, LlmError, PaymentReadiness, RiskLevel};
    use procureflix_store::{InMemoryCounterStore, InMemoryEntityStore, StoreError};
    use procureflix_workflow::{AUTO_CREATED_CONTRACT, Decision};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct Fixture {
        service: ApprovalService,
        store: InMemoryEntityStore,
        sink: InMemoryNotificationSink,
        requester: Actor,
        vendor: Actor,
        officer: Actor,
        hop: Actor,
        approvers: Vec<Actor>,
    }

    fn fixture() -> Fixture {
        let store = InMemoryEntityStore::new();
        let requester = Actor::new(Role::Requester, "Rae Requester");
        let vendor = Actor::new(Role::Vendor, "Vee Vendor");
        let officer = Actor::new(Role::ProcurementOfficer, "Olu Officer");
        let hop = Actor::new(Role::HeadOfProcurement, "Hana HoP");
        let approvers = vec![
            Actor::new(Role::ProcurementManager, "Amal"),
            Actor::new(Role::ProcurementManager, "Bo"),
        ];
        let directory: InMemoryActorDirectory = [&requester, &vendor, &officer, &hop]
            .into_iter()
            .chain(approvers.iter())
            .cloned()
            .collect();
        let sink = InMemoryNotificationSink::new();
        let service = ApprovalService::new(
            Arc::new(store.clone()),
            Arc::new(directory),
            Arc::new(sink.clone()),
            SequenceAllocator::new(Arc::new(InMemoryCounterStore::new())),
        );
        Fixture {
            service,
            store,
            sink,
            requester,
            vendor,
            officer,
            hop,
            approvers,
        }
    }

    impl Fixture {
        async fn apply(
            &self,
            entity: &WorkflowEntity,
            transition: &str,
            actor: &Actor,
            payload: TransitionPayload,
        ) -> TransitionReport {
            self.service
                .apply_transition(
                    &TransitionRequest::new(entity.entity_type(), entity.id(), transition, actor.id)
                        .with_payload(payload),
                )
                .await
                .unwrap_or_else(|e| panic!("{transition} failed: {e}"))
        }

        async fn business_request(&self) -> WorkflowEntity {
            let mut attributes = Map::new();
            attributes.insert("budget".to_string(), json!(120000));
            let entity = self
                .service
                .create(EntityType::BusinessRequest, "Fleet telematics", self.requester.id, attributes)
                .await
                .expect("create");
            let entity = self
                .apply(&entity, "submit", &self.requester, TransitionPayload::new())
                .await
                .entity;
            self.apply(
                &entity,
                "officer_validate",
                &self.officer,
                TransitionPayload::new()
                    .with_field("selected_proposal_id", json!("P-3"))
                    .with_field("selected_vendor_id", json!("V-42")),
            )
            .await
            .entity
        }

        /// A validated business request with its approval gate open.
        async fn pending_approval(&self) -> WorkflowEntity {
            let entity = self.business_request().await;
            self.service
                .apply_transition(
                    &TransitionRequest::new(
                        EntityType::BusinessRequest,
                        entity.id(),
                        "forward_for_approval",
                        self.officer.id,
                    )
                    .with_assignees(self.approvers.iter().map(|a| a.id)),
                )
                .await
                .expect("forward_for_approval")
                .entity
        }

        async fn vote(&self, entity: &WorkflowEntity, voter: &Actor, decision: Decision) -> TransitionReport {
            self.apply(
                entity,
                "approval_decide",
                voter,
                TransitionPayload::new().with_decision(decision),
            )
            .await
        }
    }

    #[tokio::test]
    async fn business_request_award_provisions_numbered_contract() {
        let fx = fixture();
        let entity = fx.pending_approval().await;
        assert_eq!(entity.status(), Status::PendingApproval);
        assert!(entity.number.as_deref().is_some_and(|n| n.starts_with("BR-")));

        let first = fx.vote(&entity, &fx.approvers[0], Decision::Approved).await;
        assert_eq!(first.gate_outcome, Some(GateOutcome::Pending));
        assert_eq!(first.entity.status(), Status::PendingApproval);
        let second = fx.vote(&entity, &fx.approvers[1], Decision::Approved).await;
        assert_eq!(second.gate_outcome, Some(GateOutcome::AllApproved));
        assert_eq!(second.entity.status(), Status::ApprovalComplete);

        let entity = fx
            .apply(&second.entity, "forward_to_hop", &fx.officer, TransitionPayload::new())
            .await
            .entity;
        let report = fx
            .apply(
                &entity,
                "hop_decide",
                &fx.hop,
                TransitionPayload::new()
                    .with_decision(Decision::Approved)
                    .with_award_vendor("V-99"),
            )
            .await;

        assert_eq!(report.entity.status(), Status::Awarded);
        let contract_id = report.provisioned_contract.expect("contract");
        assert_eq!(report.entity.linked_entity(AUTO_CREATED_CONTRACT), Some(contract_id));

        let contract = fx
            .service
            .get(EntityType::Contract, contract_id)
            .await
            .expect("contract stored");
        assert_eq!(contract.status(), Status::PendingCompletion);
        assert_eq!(contract.attributes["vendor_id"], json!("V-99"));
        assert_eq!(contract.attributes["value"], json!(120000));
        assert_eq!(
            contract.attributes["br_number"],
            json!(report.entity.number.clone().expect("br number"))
        );
        assert!(contract.number.as_deref().is_some_and(|n| n.starts_with("CTR-")));

        let stored = fx
            .service
            .get(EntityType::BusinessRequest, entity.id())
            .await
            .expect("stored");
        assert_eq!(stored, report.entity);
    }

    #[tokio::test]
    async fn award_without_vendor_rolls_back() {
        let fx = fixture();
        let entity = fx.business_request().await;
        let mut entity = fx
            .apply(
                &entity,
                "skip_to_hop",
                &fx.officer,
                TransitionPayload::new().with_notes("urgent renewal"),
            )
            .await
            .entity;
        entity.attributes.remove("selected_vendor_id");
        assert!(
            fx.store
                .compare_and_swap(EntityType::BusinessRequest, entity.id(), entity.version, &entity)
                .await
                .expect("cas")
        );
        let before = fx
            .service
            .get(EntityType::BusinessRequest, entity.id())
            .await
            .expect("before");

        let err = fx
            .service
            .apply_transition(
                &TransitionRequest::new(EntityType::BusinessRequest, entity.id(), "hop_decide", fx.hop.id)
                    .with_payload(TransitionPayload::new().with_decision(Decision::Approved)),
            )
            .await
            .expect_err("no award target");
        assert!(matches!(
            err.current_context(),
            ApprovalError::Workflow(WorkflowError::NoAwardTarget { .. })
        ));

        let after = fx
            .service
            .get(EntityType::BusinessRequest, entity.id())
            .await
            .expect("after");
        assert_eq!(after, before);
        assert!(fx.service.list(EntityType::Contract).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn notifications_follow_the_gate() {
        let fx = fixture();
        let entity = fx.pending_approval().await;
        for approver in &fx.approvers {
            assert_eq!(fx.sink.sent_to(approver.id).len(), 1, "{} was not asked", approver.display_name);
        }

        fx.vote(&entity, &fx.approvers[0], Decision::Approved).await;
        let progress = fx.sink.sent_to(fx.requester.id);
        assert!(progress.iter().any(|n| n.message.contains("waiting on the others")));

        let report = fx.vote(&entity, &fx.approvers[1], Decision::Rejected).await;
        assert_eq!(report.entity.status(), Status::Rejected);
        assert!(
            fx.sink
                .sent_to(fx.requester.id)
                .iter()
                .any(|n| n.message.ends_with("closed as rejected"))
        );
        assert!(report.failed_side_effects.is_empty());
    }

    #[tokio::test]
    async fn hop_role_is_notified_on_arrival() {
        let fx = fixture();
        let entity = fx.business_request().await;
        let report = fx
            .apply(
                &entity,
                "skip_to_hop",
                &fx.officer,
                TransitionPayload::new().with_notes("single source"),
            )
            .await;
        assert_eq!(report.entity.status(), Status::PendingHopApproval);
        assert!(report.notifications_sent >= 1);
        assert_eq!(fx.sink.sent_to(fx.hop.id).len(), 1);
    }

    #[tokio::test]
    async fn rejected_request_leaves_store_untouched() {
        let fx = fixture();
        let entity = fx.pending_approval().await;
        let before = fx
            .service
            .get(EntityType::BusinessRequest, entity.id())
            .await
            .expect("before");

        let err = fx
            .service
            .apply_transition(
                &TransitionRequest::new(
                    EntityType::BusinessRequest,
                    entity.id(),
                    "approval_decide",
                    fx.officer.id,
                )
                .with_payload(TransitionPayload::new().with_decision(Decision::Approved)),
            )
            .await
            .expect_err("officer holds no seat");
        assert!(matches!(
            err.current_context(),
            ApprovalError::Workflow(WorkflowError::NotAnAssignee { .. })
        ));

        fx.vote(&entity, &fx.approvers[0], Decision::Approved).await;
        let err = fx
            .service
            .apply_transition(
                &TransitionRequest::new(
                    EntityType::BusinessRequest,
                    entity.id(),
                    "approval_decide",
                    fx.approvers[0].id,
                )
                .with_payload(TransitionPayload::new().with_decision(Decision::Rejected)),
            )
            .await
            .expect_err("second vote");
        assert!(matches!(
            err.current_context(),
            ApprovalError::Workflow(WorkflowError::AlreadyDecided { .. })
        ));

        let after = fx
            .service
            .get(EntityType::BusinessRequest, entity.id())
            .await
            .expect("after");
        assert_eq!(after.version, before.version + 1);
        assert_eq!(after.status(), Status::PendingApproval);
    }

    #[tokio::test]
    async fn unknown_actor_and_missing_entity() {
        let fx = fixture();
        let err = fx
            .service
            .create(EntityType::BusinessRequest, "Chairs", UserId::new(), Map::new())
            .await
            .expect_err("stranger");
        assert!(matches!(err.current_context(), ApprovalError::UnknownActor { .. }));

        let err = fx
            .service
            .apply_transition(&TransitionRequest::new(
                EntityType::Contract,
                EntityId::new(),
                "submit",
                fx.officer.id,
            ))
            .await
            .expect_err("missing");
        assert!(matches!(err.current_context(), ApprovalError::NotFound { .. }));
    }

    #[tokio::test]
    async fn concurrent_votes_both_land() {
        let fx = fixture();
        let entity = fx.pending_approval().await;
        let request = |voter: &Actor| {
            TransitionRequest::new(EntityType::BusinessRequest, entity.id(), "approval_decide", voter.id)
                .with_payload(TransitionPayload::new().with_decision(Decision::Approved))
        };
        let (a, b) = (request(&fx.approvers[0]), request(&fx.approvers[1]));
        let (first, second) = tokio::join!(
            fx.service.apply_transition(&a),
            fx.service.apply_transition(&b),
        );
        first.expect("first vote");
        second.expect("second vote");

        let stored = fx
            .service
            .get(EntityType::BusinessRequest, entity.id())
            .await
            .expect("stored");
        assert_eq!(stored.status(), Status::ApprovalComplete);
        assert!(stored.role_assignments.iter().all(|a| a.decision == Decision::Approved));
    }

    /// Lets another approver vote between our read and our write, once.
    struct Interleaved {
        inner: InMemoryEntityStore,
        rival: Actor,
        engine: WorkflowEngine,
        fired: AtomicBool,
        swaps: AtomicU32,
    }

    #[async_trait]
    impl EntityStore for Interleaved {
        async fn load(&self, t: EntityType, id: EntityId) -> Result<Option<WorkflowEntity>, StoreError> {
            self.inner.load(t, id).await
        }

        async fn insert(&self, entity: &WorkflowEntity) -> Result<(), StoreError> {
            self.inner.insert(entity).await
        }

        async fn compare_and_swap(
            &self,
            t: EntityType,
            id: EntityId,
            expected_version: u64,
            entity: &WorkflowEntity,
        ) -> Result<bool, StoreError> {
            self.swaps.fetch_add(1, Ordering::SeqCst);
            let voting = entity.status() == Status::PendingApproval
                || entity.status() == Status::ApprovalComplete;
            if voting && !self.fired.swap(true, Ordering::SeqCst) {
                let current = self.inner.load(t, id).await?.expect("present");
                let rival_vote = self
                    .engine
                    .apply_transition(
                        &current,
                        "approval_decide",
                        &self.rival,
                        &TransitionPayload::new().with_decision(Decision::Approved),
                        &[],
                    )
                    .expect("rival vote")
                    .entity;
                assert!(
                    self.inner
                        .compare_and_swap(t, id, current.version, &rival_vote)
                        .await?
                );
            }
            self.inner.compare_and_swap(t, id, expected_version, entity).await
        }

        async fn delete(&self, t: EntityType, id: EntityId) -> Result<bool, StoreError> {
            self.inner.delete(t, id).await
        }

        async fn list(&self, t: EntityType) -> Result<Vec<WorkflowEntity>, StoreError> {
            self.inner.list(t).await
        }
    }

    #[tokio::test]
    async fn lost_write_is_retried_against_latest_seats() {
        let setup = fixture();
        let inner = setup.store.clone();
        let entity = setup.pending_approval().await;

        let store = Arc::new(Interleaved {
            inner: inner.clone(),
            rival: setup.approvers[1].clone(),
            engine: WorkflowEngine::standard(),
            fired: AtomicBool::new(false),
            swaps: AtomicU32::new(0),
        });
        let service = ApprovalService {
            store: store.clone(),
            ..setup.service.clone()
        };

        let report = service
            .apply_transition(
                &TransitionRequest::new(
                    EntityType::BusinessRequest,
                    entity.id(),
                    "approval_decide",
                    setup.approvers[0].id,
                )
                .with_payload(TransitionPayload::new().with_decision(Decision::Approved)),
            )
            .await
            .expect("vote after a lost write");
        assert_eq!(report.attempts, 2);
        assert_eq!(report.gate_outcome, Some(GateOutcome::AllApproved));
        assert_eq!(report.entity.status(), Status::ApprovalComplete);
        assert_eq!(store.swaps.load(Ordering::SeqCst), 2);
    }

    /// Every swap loses.
    struct AlwaysStale {
        inner: InMemoryEntityStore,
    }

    #[async_trait]
    impl EntityStore for AlwaysStale {
        async fn load(&self, t: EntityType, id: EntityId) -> Result<Option<WorkflowEntity>, StoreError> {
            self.inner.load(t, id).await
        }

        async fn insert(&self, entity: &WorkflowEntity) -> Result<(), StoreError> {
            self.inner.insert(entity).await
        }

        async fn compare_and_swap(
            &self,
            _t: EntityType,
            _id: EntityId,
            _expected_version: u64,
            _entity: &WorkflowEntity,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn delete(&self, t: EntityType, id: EntityId) -> Result<bool, StoreError> {
            self.inner.delete(t, id).await
        }

        async fn list(&self, t: EntityType) -> Result<Vec<WorkflowEntity>, StoreError> {
            self.inner.list(t).await
        }
    }

    #[tokio::test]
    async fn exhausted_retries_surface_and_leave_no_contract() {
        let setup = fixture();
        let inner = setup.store.clone();
        let entity = setup.business_request().await;
        let entity = setup
            .apply(
                &entity,
                "skip_to_hop",
                &setup.officer,
                TransitionPayload::new().with_notes("framework call-off"),
            )
            .await
            .entity;

        let service = ApprovalService {
            store: Arc::new(AlwaysStale {
                inner: inner.clone(),
            }),
            ..setup.service.clone()
        }
        .with_config(ApprovalConfig {
            max_attempts: 2,
            notify_on_gate_progress: false,
        });

        let err = service
            .apply_transition(
                &TransitionRequest::new(EntityType::BusinessRequest, entity.id(), "hop_decide", setup.hop.id)
                    .with_payload(TransitionPayload::new().with_decision(Decision::Approved)),
            )
            .await
            .expect_err("always stale");
        assert_eq!(
            err.current_context(),
            &ApprovalError::ConcurrentModification {
                entity_id: entity.id(),
                attempts: 2
            }
        );
        assert!(inner.list(EntityType::Contract).await.expect("list").is_empty());
        let stored = inner
            .load(EntityType::BusinessRequest, entity.id())
            .await
            .expect("load")
            .expect("present");
        assert_eq!(stored.status(), Status::PendingHopApproval);
    }

    /// The first swap fails outright; later ones go through.
    struct FlakySwap {
        inner: InMemoryEntityStore,
        failed: AtomicBool,
    }

    #[async_trait]
    impl EntityStore for FlakySwap {
        async fn load(&self, t: EntityType, id: EntityId) -> Result<Option<WorkflowEntity>, StoreError> {
            self.inner.load(t, id).await
        }

        async fn insert(&self, entity: &WorkflowEntity) -> Result<(), StoreError> {
            self.inner.insert(entity).await
        }

        async fn compare_and_swap(
            &self,
            t: EntityType,
            id: EntityId,
            expected_version: u64,
            entity: &WorkflowEntity,
        ) -> Result<bool, StoreError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Unavailable {
                    reason: "connection reset".to_string(),
                });
            }
            self.inner.compare_and_swap(t, id, expected_version, entity).await
        }

        async fn delete(&self, t: EntityType, id: EntityId) -> Result<bool, StoreError> {
            self.inner.delete(t, id).await
        }

        async fn list(&self, t: EntityType) -> Result<Vec<WorkflowEntity>, StoreError> {
            self.inner.list(t).await
        }
    }

    #[tokio::test]
    async fn failed_write_discards_contract_and_retry_provisions_once() {
        let setup = fixture();
        let inner = setup.store.clone();
        let entity = setup.business_request().await;
        let entity = setup
            .apply(
                &entity,
                "skip_to_hop",
                &setup.officer,
                TransitionPayload::new().with_notes("framework call-off"),
            )
            .await
            .entity;

        let service = ApprovalService {
            store: Arc::new(FlakySwap {
                inner: inner.clone(),
                failed: AtomicBool::new(false),
            }),
            ..setup.service.clone()
        };
        let award = TransitionRequest::new(
            EntityType::BusinessRequest,
            entity.id(),
            "hop_decide",
            setup.hop.id,
        )
        .with_payload(TransitionPayload::new().with_decision(Decision::Approved));

        let err = service.apply_transition(&award).await.expect_err("store down");
        assert!(matches!(err.current_context(), ApprovalError::Store { .. }));
        assert!(inner.list(EntityType::Contract).await.expect("list").is_empty());
        let stored = inner
            .load(EntityType::BusinessRequest, entity.id())
            .await
            .expect("load")
            .expect("present");
        assert_eq!(stored.status(), Status::PendingHopApproval);

        let report = service.apply_transition(&award).await.expect("retry");
        assert_eq!(report.entity.status(), Status::Awarded);
        let contracts = inner.list(EntityType::Contract).await.expect("list");
        assert_eq!(contracts.len(), 1);
        assert_eq!(report.provisioned_contract, Some(contracts[0].id()));
    }

    struct Unreachable;

    #[async_trait]
    impl NotificationSink for Unreachable {
        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::DeliveryFailed {
                recipient: notification.recipient,
                reason: "mail relay down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn failed_notifications_do_not_undo_the_transition() {
        let fx = fixture();
        let entity = fx.business_request().await;
        let service = fx.service.clone();
        let service = ApprovalService {
            notifier: Arc::new(Unreachable),
            ..service
        };

        let report = service
            .apply_transition(
                &TransitionRequest::new(EntityType::BusinessRequest, entity.id(), "skip_to_hop", fx.officer.id)
                    .with_payload(TransitionPayload::new().with_notes("sole supplier")),
            )
            .await
            .expect("committed despite notification failure");
        assert_eq!(report.notifications_sent, 0);
        assert!(!report.failed_side_effects.is_empty());
        assert!(report.failed_side_effects[0].contains("mail relay down"));

        let stored = service
            .get(EntityType::BusinessRequest, entity.id())
            .await
            .expect("stored");
        assert_eq!(stored.status(), Status::PendingHopApproval);
    }

    #[tokio::test]
    async fn undelivered_seat_notices_are_reported() {
        let fx = fixture();
        let entity = fx.pending_approval().await;
        let service = ApprovalService {
            notifier: Arc::new(Unreachable),
            ..fx.service.clone()
        };

        let assignment = service
            .assign_parallel_gate(
                EntityType::BusinessRequest,
                entity.id(),
                GateName::Approvers,
                &[fx.approvers[0].id, fx.approvers[1].id],
                fx.officer.id,
            )
            .await
            .expect("seated despite notification failure");
        assert_eq!(assignment.entity.gate_assignments(GateName::Approvers).count(), 2);
        assert_eq!(assignment.notifications_sent, 0);
        assert_eq!(assignment.failed_side_effects.len(), 2);
        assert!(assignment.failed_side_effects[0].contains("mail relay down"));
    }

    #[test]
    fn snapshot_failures_are_advisory_errors() {
        let err = serde_json::from_str::<JsonValue>("{").expect_err("truncated");
        assert!(matches!(snapshot_failure(err), ApprovalError::Advisory { .. }));
    }

    /// Advisor with a fixed answer that counts calls.
    struct FixedAdvisor {
        answer: Option<AdvisoryAssessment>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl AiAdvisory for FixedAdvisor {
        async fn assess(
            &self,
            kind: AdvisoryKind,
            _snapshot: &JsonValue,
        ) -> Result<AdvisoryAssessment, Report<AdvisoryError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Some(answer) => Ok(answer.clone()),
                None => Err(AdvisoryError::Backend {
                    kind,
                    source: LlmError::Timeout,
                }
                .into()),
            }
        }
    }

    async fn validated_deliverable(fx: &Fixture) -> WorkflowEntity {
        let entity = fx
            .service
            .create(EntityType::Deliverable, "Milestone 2", fx.vendor.id, Map::new())
            .await
            .expect("create");
        let entity = fx.apply(&entity, "submit", &fx.vendor, TransitionPayload::new()).await.entity;
        let entity = fx
            .apply(&entity, "start_review", &fx.officer, TransitionPayload::new())
            .await
            .entity;
        fx.apply(&entity, "officer_validate", &fx.officer, TransitionPayload::new())
            .await
            .entity
    }

    #[tokio::test]
    async fn deliverable_flow_attaches_readiness_and_numbers_paf() {
        let mut fx = fixture();
        let advisor = Arc::new(FixedAdvisor {
            answer: Some(AdvisoryAssessment::payment_readiness(
                PaymentReadiness::NotReady,
                vec!["acceptance certificate missing".to_string()],
            )),
            calls: AtomicU32::new(0),
        });
        fx.service = fx.service.clone().with_advisory(advisor.clone());
        let entity = validated_deliverable(&fx).await;
        assert!(entity.number.is_none());

        let report = fx
            .apply(&entity, "forward_to_hop", &fx.officer, TransitionPayload::new())
            .await;
        assert_eq!(report.entity.status(), Status::PendingHopApproval);
        assert_eq!(advisor.calls.load(Ordering::SeqCst), 1);
        let notes = report
            .entity
            .audit_trail()
            .last()
            .and_then(|e| e.notes.clone())
            .expect("notes");
        assert!(notes.to_lowercase().contains("not ready"), "{notes}");

        let report = fx
            .apply(
                &report.entity,
                "hop_decide",
                &fx.hop,
                TransitionPayload::new().with_decision(Decision::Approved),
            )
            .await;
        assert_eq!(report.entity.status(), Status::Approved);
        let paf = report.entity.attribute_str("paf_number").expect("paf number");
        assert!(paf.starts_with("PAF-"), "{paf}");
        assert_eq!(advisor.calls.load(Ordering::SeqCst), 1);

        let exported = fx
            .service
            .mark_exported(entity.id(), fx.officer.id)
            .await
            .expect("export");
        assert!(exported.is_exported());
        let again = fx
            .service
            .mark_exported(entity.id(), fx.officer.id)
            .await
            .expect("export twice");
        assert_eq!(again.version, exported.version);
    }

    #[tokio::test]
    async fn resubmitted_deliverable_is_assessed_again() {
        let mut fx = fixture();
        let advisor = Arc::new(FixedAdvisor {
            answer: Some(AdvisoryAssessment::payment_readiness(
                PaymentReadiness::NotReady,
                vec!["acceptance certificate missing".to_string()],
            )),
            calls: AtomicU32::new(0),
        });
        fx.service = fx.service.clone().with_advisory(advisor.clone());
        let entity = validated_deliverable(&fx).await;
        let entity = fx
            .apply(&entity, "forward_to_hop", &fx.officer, TransitionPayload::new())
            .await
            .entity;
        let returned = fx
            .apply(
                &entity,
                "hop_decide",
                &fx.hop,
                TransitionPayload::new()
                    .with_decision(Decision::Returned)
                    .with_notes("attach the certificate"),
            )
            .await
            .entity;
        assert_eq!(returned.status(), Status::ReturnedForRevision);
        assert!(returned.advisory().is_none());

        let entity = fx.apply(&returned, "submit", &fx.vendor, TransitionPayload::new()).await.entity;
        let entity = fx
            .apply(&entity, "start_review", &fx.officer, TransitionPayload::new())
            .await
            .entity;
        let entity = fx
            .apply(&entity, "officer_validate", &fx.officer, TransitionPayload::new())
            .await
            .entity;
        let report = fx
            .apply(&entity, "forward_to_hop", &fx.officer, TransitionPayload::new())
            .await;
        assert_eq!(report.entity.status(), Status::PendingHopApproval);
        assert_eq!(advisor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_advisor_blocks_only_required_advisories() {
        let mut fx = fixture();
        fx.service = fx.service.clone().with_advisory(Arc::new(FixedAdvisor {
            answer: None,
            calls: AtomicU32::new(0),
        }));
        let entity = validated_deliverable(&fx).await;
        let err = fx
            .service
            .apply_transition(&TransitionRequest::new(
                EntityType::Deliverable,
                entity.id(),
                "forward_to_hop",
                fx.officer.id,
            ))
            .await
            .expect_err("readiness is required");
        assert!(matches!(err.current_context(), ApprovalError::Advisory { .. }));

        let vendor_dd = fx
            .service
            .create(EntityType::VendorDd, "Acme Ltd", fx.vendor.id, Map::new())
            .await
            .expect("create");
        let vendor_dd = fx.apply(&vendor_dd, "submit", &fx.vendor, TransitionPayload::new()).await.entity;
        let report = fx
            .apply(&vendor_dd, "officer_review", &fx.officer, TransitionPayload::new())
            .await;
        assert_eq!(report.entity.status(), Status::PendingHopApproval);
        assert!(report.entity.advisory().is_none());
    }

    #[tokio::test]
    async fn high_risk_vendor_needs_acceptance_then_gets_number() {
        let mut fx = fixture();
        fx.service = fx.service.clone().with_advisory(Arc::new(FixedAdvisor {
            answer: Some(AdvisoryAssessment::vendor_risk(
                RiskLevel::High,
                vec!["adverse media".to_string()],
            )),
            calls: AtomicU32::new(0),
        }));
        let entity = fx
            .service
            .create(EntityType::VendorDd, "Acme Ltd", fx.vendor.id, Map::new())
            .await
            .expect("create");
        let entity = fx.apply(&entity, "submit", &fx.vendor, TransitionPayload::new()).await.entity;
        let entity = fx
            .apply(&entity, "officer_review", &fx.officer, TransitionPayload::new())
            .await
            .entity;
        assert_eq!(entity.advisory().and_then(AdvisoryAssessment::risk_level), Some(RiskLevel::High));

        let approve = TransitionRequest::new(EntityType::VendorDd, entity.id(), "hop_decide", fx.hop.id)
            .with_payload(TransitionPayload::new().with_decision(Decision::Approved));
        let err = fx.service.apply_transition(&approve).await.expect_err("needs acceptance");
        assert!(matches!(
            err.current_context(),
            ApprovalError::Workflow(WorkflowError::MissingRiskAcceptance { .. })
        ));

        fx.service
            .record_risk_acceptance(
                entity.id(),
                "strategic supplier",
                &["quarterly audit".to_string()],
                fx.hop.id,
            )
            .await
            .expect("accept risk");
        let report = fx.service.apply_transition(&approve).await.expect("approve");
        assert_eq!(report.entity.status(), Status::Approved);
        assert!(
            report
                .entity
                .attribute_str("vendor_number")
                .is_some_and(|n| n.starts_with("VND-"))
        );
    }

    #[tokio::test]
    async fn gate_assignment_and_lookup() {
        let fx = fixture();
        let entity = fx.pending_approval().await;
        let before = fx.sink.sent().len();

        let assignment = fx
            .service
            .assign_parallel_gate(
                EntityType::BusinessRequest,
                entity.id(),
                GateName::Approvers,
                &[fx.approvers[1].id],
                fx.officer.id,
            )
            .await
            .expect("reassign");
        let updated = assignment.entity;
        assert_eq!(updated.gate_assignments(GateName::Approvers).count(), 1);
        assert_eq!(assignment.notifications_sent, 1);
        assert!(assignment.failed_side_effects.is_empty());
        assert_eq!(fx.sink.sent().len(), before + 1);

        let err = fx
            .service
            .assign_parallel_gate(
                EntityType::BusinessRequest,
                entity.id(),
                GateName::Approvers,
                &[],
                fx.officer.id,
            )
            .await
            .expect_err("empty");
        assert!(matches!(
            err.current_context(),
            ApprovalError::Workflow(WorkflowError::EmptyAssigneeList { .. })
        ));

        fx.vote(&updated, &fx.approvers[1], Decision::Approved).await;
        let outcome = fx
            .service
            .resolve_gate(EntityType::BusinessRequest, entity.id(), GateName::Approvers)
            .await
            .expect("resolve");
        assert_eq!(outcome, GateOutcome::AllApproved);

        let available = fx
            .service
            .available_transitions(EntityType::BusinessRequest, entity.id(), fx.officer.id)
            .await
            .expect("available");
        assert!(available.contains("forward_to_hop"));
        assert!(!available.contains("hop_decide"));
    }
}
