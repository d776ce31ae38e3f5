//! Route configuration for the extension API.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use dtx_actions::{Action, MAINTENANCE_ACTION_ID, PROBLEM_CHECK_ACTION_ID};
use dtx_events::LifecycleKind;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    action_path, describe_action, health_check, index, prepare_action, receive_event,
    start_action, status_action, stop_action,
};
use crate::state::AppState;

/// Create the extension router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut events = Router::new();
    for kind in LifecycleKind::ALL {
        events = events.route(
            kind.path(),
            post(move |State(state): State<Arc<AppState>>, body: Bytes| {
                receive_event(state, kind, body)
            }),
        );
    }

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .merge(events)
        .with_state(state.clone())
        .nest(
            &action_path(MAINTENANCE_ACTION_ID),
            action_router(state.maintenance()),
        )
        .nest(
            &action_path(PROBLEM_CHECK_ACTION_ID),
            action_router(state.problem_check()),
        )
        .layer(TraceLayer::new_for_http())
}

/// Routes of one action, relative to its prefix.
pub fn action_router<A: Action + 'static>(action: Arc<A>) -> Router {
    Router::new()
        .route("/", get(describe_action::<A>))
        .route("/prepare", post(prepare_action::<A>))
        .route("/start", post(start_action::<A>))
        .route("/status", post(status_action::<A>))
        .route("/stop", post(stop_action::<A>))
        .with_state(action)
}
