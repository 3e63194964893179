use crate::adapters::{to_new_incident, CloudwatchAlarmAdapter, GenericAdapter, PayloadAdapter};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use responder_core::error::OrchestratorError;
use responder_core::gate::Decision;
use responder_core::orchestrator::Orchestrator;
use responder_core::store::IncidentStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn IncidentStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/incidents", post(ingest_generic).get(list_incidents))
        .route("/incidents/cloudwatch", post(ingest_cloudwatch))
        .route("/incidents/:id", get(get_incident))
        .route("/incidents/:id/decision", post(post_decision))
        .with_state(state)
}

type ApiResponse = (StatusCode, Json<serde_json::Value>);

async fn ingest_generic(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    ingest(&state, GenericAdapter, &payload)
}

async fn ingest_cloudwatch(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    ingest(&state, CloudwatchAlarmAdapter, &payload)
}

fn ingest(state: &AppState, adapter: impl PayloadAdapter, payload: &serde_json::Value) -> ApiResponse {
    let canonical = match adapter.parse(payload) {
        Ok(canonical) => canonical,
        Err(reason) => {
            warn!(%reason, "rejected ingestion payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": reason})),
            );
        }
    };

    match state.orchestrator.create_incident(to_new_incident(canonical)) {
        Ok(incident_id) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"incidentId": incident_id})),
        ),
        Err(err) => error_response(err),
    }
}

async fn get_incident(State(state): State<AppState>, Path(id): Path<String>) -> ApiResponse {
    match state.store.latest(&id) {
        Ok(Some(incident)) => match serde_json::to_value(&incident) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(err) => internal_error(err.to_string()),
        },
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("incident {id} not found")})),
        ),
        Err(err) => internal_error(err.to_string()),
    }
}

async fn list_incidents(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResponse {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(50);

    match state.store.list_latest(limit) {
        Ok(incidents) => match serde_json::to_value(&incidents) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(err) => internal_error(err.to_string()),
        },
        Err(err) => internal_error(err.to_string()),
    }
}

async fn post_decision(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    let action = payload
        .get("action")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    let decision = match Decision::parse(action) {
        Ok(decision) => decision,
        Err(err) => return error_response(err),
    };
    let user = payload
        .get("user")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown");
    let reason = payload.get("reason").and_then(serde_json::Value::as_str);

    match state.orchestrator.decide(&id, decision, user, reason) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "incidentId": outcome.incident_id,
                "status": outcome.status,
                "message": outcome.message,
            })),
        ),
        Err(err) => error_response(err),
    }
}

fn error_response(err: OrchestratorError) -> ApiResponse {
    let status = match &err {
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(error = %err, "request failed");
    }
    (status, Json(serde_json::json!({"error": err.to_string()})))
}

fn internal_error(reason: String) -> ApiResponse {
    warn!(%reason, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": reason})),
    )
}
