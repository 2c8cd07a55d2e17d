//! Outfit analysis endpoint: validate the payload, relay to the vision
//! model, and seed the session coordinator with the result.
//!
//! Validation failures return a client error before the model is ever
//! called. Provider failures never surface as server errors; the relay
//! degrades to its fixed fallback sentence.

use crate::SharedState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chroma_vision::{color_summary, EncodedImage};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "imageData")]
    image_data: Option<ImagePayload>,
}

#[derive(Deserialize)]
pub struct ImagePayload {
    #[serde(default)]
    data: Option<String>,
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
}

fn invalid_image() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Missing or invalid image data" })),
    )
        .into_response()
}

/// `POST /api/v1/analyze-outfit`
pub async fn analyze_outfit(
    State(state): State<SharedState>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    let Some(payload) = request.image_data else {
        return invalid_image();
    };
    let (Some(data), Some(mime_type)) = (payload.data, payload.mime_type) else {
        return invalid_image();
    };
    let image = match EncodedImage::from_parts(&mime_type, &data) {
        Ok(image) => image,
        Err(e) => {
            warn!(target: "chroma::gateway", "Rejected analysis request: {}", e);
            return invalid_image();
        }
    };

    info!(target: "chroma::gateway", "Analyzing outfit image ({})", image.mime_type);
    let generation = state.session.begin_analysis().await;
    let description = state.analyzer.analyze(&image).await;

    if !state
        .session
        .complete_analysis(generation, description.clone())
        .await
    {
        // A newer upload started while this analysis was in flight.
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Superseded by a newer upload" })),
        )
            .into_response();
    }

    // Short display summary from the color identification section, when the
    // model honored the requested structure.
    let summary = color_summary(&description).map(String::from);
    (
        StatusCode::OK,
        Json(json!({ "description": description, "colorSummary": summary })),
    )
        .into_response()
}
