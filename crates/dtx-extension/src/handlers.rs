//! HTTP request handlers.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use dtx_actions::{
    Action, ActionDescription, ActionError, MAINTENANCE_ACTION_ID, PROBLEM_CHECK_ACTION_ID,
    PrepareRequest, StopResult,
};
use dtx_events::{LifecycleEvent, LifecycleKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{ExtensionError, ExtensionResult};
use crate::state::AppState;

/// One endpoint listed in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// HTTP method.
    pub method: String,
    /// Absolute path.
    pub path: String,
}

impl Endpoint {
    fn new(method: &str, path: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            path: path.into(),
        }
    }
}

/// Response of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    /// Action description endpoints.
    pub actions: Vec<Endpoint>,
    /// Webhook endpoints, one per lifecycle kind.
    pub event_listeners: Vec<Endpoint>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
}

/// Handle GET / - lists everything the extension offers.
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        actions: [MAINTENANCE_ACTION_ID, PROBLEM_CHECK_ACTION_ID]
            .into_iter()
            .map(|id| Endpoint::new("GET", action_path(id)))
            .collect(),
        event_listeners: LifecycleKind::ALL
            .into_iter()
            .map(|kind| Endpoint::new("POST", kind.path()))
            .collect(),
    })
}

/// Handle GET /health.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Path prefix of an action's endpoints.
#[must_use]
pub fn action_path(id: &str) -> String {
    format!("/actions/{id}")
}

// ==================== Event Webhooks ====================

/// Handle POST /events/* - translates and forwards one lifecycle event.
///
/// Forwarding is best effort; only an unreadable body fails the request.
pub async fn receive_event(
    state: Arc<AppState>,
    kind: LifecycleKind,
    body: Bytes,
) -> ExtensionResult<Json<Value>> {
    let event = LifecycleEvent::parse(kind, &body)
        .inspect_err(|e| warn!(kind = %kind, error = %e, "rejected lifecycle event"))?;
    debug!(kind = %kind, "received lifecycle event");

    state.forwarder().forward(&event).await;
    Ok(Json(json!({})))
}

// ==================== Actions ====================

#[derive(Debug, Deserialize)]
struct StateRequest {
    state: Value,
}

/// Body returned by prepare.
#[derive(Debug, Serialize)]
pub struct PrepareResponse<S> {
    /// Initial action state.
    pub state: S,
}

/// Body returned by start and status: the result plus the updated state.
#[derive(Debug, Serialize)]
pub struct StateResponse<S, R> {
    /// Updated action state.
    pub state: S,
    /// Call result.
    #[serde(flatten)]
    pub result: R,
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> ExtensionResult<T> {
    serde_json::from_slice(body).map_err(|e| ExtensionError::InvalidRequest(e.to_string()))
}

fn decode_state<S: DeserializeOwned>(body: &[u8]) -> ExtensionResult<S> {
    let request: StateRequest = decode_body(body)?;
    serde_json::from_value(request.state).map_err(|e| {
        ExtensionError::from(ActionError::InvalidState {
            reason: e.to_string(),
        })
    })
}

/// Handle GET /actions/{id}.
pub async fn describe_action<A: Action>(State(action): State<Arc<A>>) -> Json<ActionDescription> {
    Json(action.describe())
}

/// Handle POST /actions/{id}/prepare.
pub async fn prepare_action<A: Action>(
    State(action): State<Arc<A>>,
    body: Bytes,
) -> ExtensionResult<Json<PrepareResponse<A::State>>> {
    let request: PrepareRequest = decode_body(&body)?;
    let state = action.prepare(&request)?;
    Ok(Json(PrepareResponse { state }))
}

/// Handle POST /actions/{id}/start.
pub async fn start_action<A: Action>(
    State(action): State<Arc<A>>,
    body: Bytes,
) -> ExtensionResult<Json<StateResponse<A::State, dtx_actions::StartResult>>> {
    let mut state: A::State = decode_state(&body)?;
    let result = action.start(&mut state).await?;
    Ok(Json(StateResponse { state, result }))
}

/// Handle POST /actions/{id}/status.
pub async fn status_action<A: Action>(
    State(action): State<Arc<A>>,
    body: Bytes,
) -> ExtensionResult<Json<StateResponse<A::State, dtx_actions::StatusResult>>> {
    let mut state: A::State = decode_state(&body)?;
    let result = action.status(&mut state).await?;
    Ok(Json(StateResponse { state, result }))
}

/// Handle POST /actions/{id}/stop.
pub async fn stop_action<A: Action>(
    State(action): State<Arc<A>>,
    body: Bytes,
) -> ExtensionResult<Json<StopResult>> {
    let mut state: A::State = decode_state(&body)?;
    let result = action.stop(&mut state).await?;
    Ok(Json(result))
}
