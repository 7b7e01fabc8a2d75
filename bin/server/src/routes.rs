//! JSON routes over the approval service.
//!
//! The acting user is named by the `x-actor-id` header and resolved through
//! the actor directory.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use procureflix_approvals::{GateAssignment, TransitionReport, TransitionRequest};
use procureflix_core::{EntityId, UserId};
use procureflix_workflow::{EntityType, GateName, GateOutcome, TransitionPayload, WorkflowEntity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::str::FromStr;
use tower_http::trace::TraceLayer;

/// Header naming the acting user.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/entities/{entity_type}", post(create_entity).get(list_entities))
        .route("/entities/{entity_type}/{id}", get(get_entity))
        .route(
            "/entities/{entity_type}/{id}/transitions",
            get(available_transitions),
        )
        .route(
            "/entities/{entity_type}/{id}/transitions/{name}",
            post(apply_transition),
        )
        .route(
            "/entities/{entity_type}/{id}/gates/{gate}",
            get(resolve_gate).put(assign_gate),
        )
        .route(
            "/vendor-dd/{id}/risk-acceptance",
            post(record_risk_acceptance),
        )
        .route("/deliverables/{id}/export", post(mark_exported))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse<T: FromStr>(what: &str, raw: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| ApiError::BadRequest {
        reason: format!("{what}: {e}"),
    })
}

fn actor_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get(ACTOR_HEADER)
        .ok_or(ApiError::MissingActor)?
        .to_str()
        .map_err(|e| ApiError::BadRequest {
            reason: format!("{ACTOR_HEADER}: {e}"),
        })?;
    parse(ACTOR_HEADER, raw)
}

async fn health() -> &'static str {
    "ok"
}

/// Body for creating an entity.
#[derive(Debug, Deserialize)]
pub struct CreateEntity {
    /// Title.
    pub title: String,
    /// Document attributes, e.g. `budget`.
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

async fn create_entity(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreateEntity>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_type: EntityType = parse("entity type", &entity_type)?;
    let actor = actor_id(&headers)?;
    let entity = state
        .service
        .create(entity_type, &body.title, actor, body.attributes)
        .await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

async fn list_entities(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
) -> Result<Json<Vec<WorkflowEntity>>, ApiError> {
    let entity_type: EntityType = parse("entity type", &entity_type)?;
    Ok(Json(state.service.list(entity_type).await?))
}

async fn get_entity(
    State(state): State<AppState>,
    Path((entity_type, id)): Path<(String, String)>,
) -> Result<Json<WorkflowEntity>, ApiError> {
    let entity_type: EntityType = parse("entity type", &entity_type)?;
    let id: EntityId = parse("entity id", &id)?;
    Ok(Json(state.service.get(entity_type, id).await?))
}

/// Transitions the caller may request.
#[derive(Debug, Serialize, Deserialize)]
pub struct AvailableTransitions {
    /// Transition names, sorted.
    pub transitions: Vec<String>,
}

async fn available_transitions(
    State(state): State<AppState>,
    Path((entity_type, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<AvailableTransitions>, ApiError> {
    let entity_type: EntityType = parse("entity type", &entity_type)?;
    let id: EntityId = parse("entity id", &id)?;
    let actor = actor_id(&headers)?;
    let available = state
        .service
        .available_transitions(entity_type, id, actor)
        .await?;
    Ok(Json(AvailableTransitions {
        transitions: available.into_iter().map(str::to_string).collect(),
    }))
}

/// Body for applying a transition.
#[derive(Debug, Default, Deserialize)]
pub struct ApplyTransition {
    /// Decision, notes and captured fields.
    #[serde(default)]
    pub payload: TransitionPayload,
    /// Seats for a gate this transition opens.
    #[serde(default)]
    pub assignees: Vec<UserId>,
}

async fn apply_transition(
    State(state): State<AppState>,
    Path((entity_type, id, name)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<ApplyTransition>,
) -> Result<Json<TransitionReport>, ApiError> {
    let entity_type: EntityType = parse("entity type", &entity_type)?;
    let id: EntityId = parse("entity id", &id)?;
    let actor = actor_id(&headers)?;
    let request = TransitionRequest::new(entity_type, id, name, actor)
        .with_payload(body.payload)
        .with_assignees(body.assignees);
    Ok(Json(state.service.apply_transition(&request).await?))
}

/// A gate's current resolution.
#[derive(Debug, Serialize, Deserialize)]
pub struct GateResolution {
    /// The gate.
    pub gate: GateName,
    /// Its outcome.
    pub outcome: GateOutcome,
}

async fn resolve_gate(
    State(state): State<AppState>,
    Path((entity_type, id, gate)): Path<(String, String, String)>,
) -> Result<Json<GateResolution>, ApiError> {
    let entity_type: EntityType = parse("entity type", &entity_type)?;
    let id: EntityId = parse("entity id", &id)?;
    let gate: GateName = parse("gate", &gate)?;
    let outcome = state.service.resolve_gate(entity_type, id, gate).await?;
    Ok(Json(GateResolution { gate, outcome }))
}

/// Body for seating a gate.
#[derive(Debug, Deserialize)]
pub struct AssignGate {
    /// Who decides.
    pub assignees: Vec<UserId>,
}

async fn assign_gate(
    State(state): State<AppState>,
    Path((entity_type, id, gate)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<AssignGate>,
) -> Result<Json<GateAssignment>, ApiError> {
    let entity_type: EntityType = parse("entity type", &entity_type)?;
    let id: EntityId = parse("entity id", &id)?;
    let gate: GateName = parse("gate", &gate)?;
    let actor = actor_id(&headers)?;
    let assignment = state
        .service
        .assign_parallel_gate(entity_type, id, gate, &body.assignees, actor)
        .await?;
    Ok(Json(assignment))
}

/// Body for recording a risk acceptance.
#[derive(Debug, Deserialize)]
pub struct RiskAcceptanceBody {
    /// Why the risk is accepted.
    pub reason: String,
    /// Controls that offset it.
    #[serde(default)]
    pub mitigating_controls: Vec<String>,
}

async fn record_risk_acceptance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RiskAcceptanceBody>,
) -> Result<Json<WorkflowEntity>, ApiError> {
    let id: EntityId = parse("entity id", &id)?;
    let actor = actor_id(&headers)?;
    let entity = state
        .service
        .record_risk_acceptance(id, &body.reason, &body.mitigating_controls, actor)
        .await?;
    Ok(Json(entity))
}

async fn mark_exported(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<WorkflowEntity>, ApiError> {
    let id: EntityId = parse("entity id", &id)?;
    let actor = actor_id(&headers)?;
    Ok(Json(state.service.mark_exported(id, actor).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use procureflix_access::{Actor, InMemoryActorDirectory, Role};
    use procureflix_approvals::{ApprovalService, InMemoryNotificationSink};
    use procureflix_store::{InMemoryCounterStore, InMemoryEntityStore, SequenceAllocator};
    use procureflix_workflow::Status;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        requester: Actor,
        officer: Actor,
        hop: Actor,
    }

    fn test_app() -> TestApp {
        let requester = Actor::new(Role::Requester, "Rae");
        let officer = Actor::new(Role::ProcurementOfficer, "Olu");
        let hop = Actor::new(Role::HeadOfProcurement, "Hana");
        let directory: InMemoryActorDirectory =
            [requester.clone(), officer.clone(), hop.clone()].into_iter().collect();
        let service = ApprovalService::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(directory),
            Arc::new(InMemoryNotificationSink::new()),
            SequenceAllocator::new(Arc::new(InMemoryCounterStore::new())),
        );
        TestApp {
            router: router(AppState::new(service)),
            requester,
            officer,
            hop,
        }
    }

    async fn send(
        app: &TestApp,
        method: &str,
        uri: &str,
        actor: Option<&Actor>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            request = request.header(ACTOR_HEADER, actor.id.to_string());
        }
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&body).expect("encode"))
            }
            None => Body::empty(),
        };
        let response = app
            .router
            .clone()
            .oneshot(request.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }

    async fn created_request(app: &TestApp) -> String {
        let (status, entity) = send(
            app,
            "POST",
            "/entities/business_request",
            Some(&app.requester),
            Some(json!({ "title": "Office chairs", "attributes": { "budget": 8000 } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        entity["id"].as_str().expect("id").to_string()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = test_app();
        let (status, _) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn create_then_walk_to_hop_and_award() {
        let app = test_app();
        let id = created_request(&app).await;
        let base = format!("/entities/business_request/{id}");

        let (status, entity) = send(&app, "GET", &base, Some(&app.requester), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entity["status"], json!("draft"));

        let (status, available) =
            send(&app, "GET", &format!("{base}/transitions"), Some(&app.requester), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            available["transitions"]
                .as_array()
                .expect("array")
                .contains(&json!("submit"))
        );

        let (status, _) = send(
            &app,
            "POST",
            &format!("{base}/transitions/submit"),
            Some(&app.requester),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            "POST",
            &format!("{base}/transitions/officer_validate"),
            Some(&app.officer),
            Some(json!({ "payload": { "selected_vendor_id": "V-1" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, report) = send(
            &app,
            "POST",
            &format!("{base}/transitions/skip_to_hop"),
            Some(&app.officer),
            Some(json!({ "payload": { "notes": "framework agreement" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["entity"]["status"], json!(Status::PendingHopApproval.as_str()));

        let (status, report) = send(
            &app,
            "POST",
            &format!("{base}/transitions/hop_decide"),
            Some(&app.hop),
            Some(json!({ "payload": { "decision": "approved" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{report}");
        assert_eq!(report["entity"]["status"], json!("awarded"));
        let contract = report["provisioned_contract"].as_str().expect("contract id");

        let (status, contract) = send(
            &app,
            "GET",
            &format!("/entities/contract/{contract}"),
            Some(&app.officer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(contract["status"], json!("pending_completion"));
        assert_eq!(contract["attributes"]["vendor_id"], json!("V-1"));
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = test_app();
        let id = created_request(&app).await;
        let base = format!("/entities/business_request/{id}");

        let (status, _) = send(&app, "POST", &format!("{base}/transitions/submit"), None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/transitions/award"),
            Some(&app.officer),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("message").contains("award"));

        let (status, _) = send(
            &app,
            "POST",
            &format!("{base}/transitions/hop_decide"),
            Some(&app.hop),
            Some(json!({ "payload": { "decision": "approved" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            &format!("{base}/transitions/cancel"),
            Some(&app.requester),
            Some(json!({ "payload": { "notes": "no longer needed" } })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            "GET",
            &format!("/entities/business_request/{}", EntityId::new().as_ulid()),
            Some(&app.officer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/entities/invoice", Some(&app.officer), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let stranger = Actor::new(Role::Admin, "Nobody");
        let (status, _) = send(
            &app,
            "POST",
            "/entities/business_request",
            Some(&stranger),
            Some(json!({ "title": "Desks" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn gate_routes() {
        let app = test_app();
        let id = created_request(&app).await;
        let base = format!("/entities/business_request/{id}");

        let (status, assignment) = send(
            &app,
            "PUT",
            &format!("{base}/gates/approvers"),
            Some(&app.officer),
            Some(json!({ "assignees": [app.hop.id.as_ulid().to_string()] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            assignment["entity"]["role_assignments"]
                .as_array()
                .expect("seats")
                .len(),
            1
        );
        assert_eq!(assignment["notifications_sent"], json!(1));

        let (status, resolution) =
            send(&app, "GET", &format!("{base}/gates/approvers"), Some(&app.officer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolution["outcome"], json!("pending"));

        let (status, _) =
            send(&app, "GET", &format!("{base}/gates/jury"), Some(&app.officer), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn export_requires_approval() {
        let app = test_app();
        let (status, entity) = send(
            &app,
            "POST",
            "/entities/deliverable",
            Some(&app.requester),
            Some(json!({ "title": "Milestone 1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = entity["id"].as_str().expect("id");

        let (status, _) = send(
            &app,
            "POST",
            &format!("/deliverables/{id}/export"),
            Some(&app.officer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
