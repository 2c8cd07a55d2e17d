//! HTTP handlers for the Chroma gateway.

pub mod analyze;
pub mod session;

use crate::{SharedState, GATEWAY_VERSION};
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

/// Liveness probe with identity and version.
pub async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "app": state.config.app_name,
        "version": GATEWAY_VERSION,
    }))
}
