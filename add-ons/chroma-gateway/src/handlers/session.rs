//! Voice session endpoints: start, end, mute, and read-only state views.

use crate::SharedState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chroma_session::SessionError;
use serde_json::json;
use tracing::warn;

/// `POST /api/v1/session/start`
pub async fn start(State(state): State<SharedState>) -> Response {
    match state.session.start().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "starting" }))).into_response(),
        Err(e @ (SessionError::AlreadyConnected | SessionError::NotReady(_))) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => {
            warn!(target: "chroma::gateway", "Session start failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// `POST /api/v1/session/end` — idempotent.
pub async fn end(State(state): State<SharedState>) -> Response {
    match state.session.end().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ended" }))).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// `POST /api/v1/session/mute` — toggles, returns the acknowledged flag.
pub async fn toggle_mute(State(state): State<SharedState>) -> Response {
    match state.session.toggle_mute().await {
        Ok(muted) => (StatusCode::OK, Json(json!({ "muted": muted }))).into_response(),
        Err(SessionError::NoActiveCall) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "No active call" })),
        )
            .into_response(),
        Err(e) => {
            warn!(target: "chroma::gateway", "Mute toggle failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// `GET /api/v1/session/state`
pub async fn state(State(state): State<SharedState>) -> Response {
    let coordinator = state.session.coordinator();
    let snapshot = coordinator.lock().await.snapshot();
    Json(snapshot).into_response()
}

/// `GET /api/v1/session/transcript`
pub async fn transcript(State(state): State<SharedState>) -> Response {
    let coordinator = state.session.coordinator();
    let guard = coordinator.lock().await;
    Json(json!({ "messages": guard.transcript().messages() })).into_response()
}
