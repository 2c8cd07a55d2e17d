//! Vision analysis client: one image in, one text analysis out.
//!
//! The provider call is a single attempt with no retry. `analyze` never fails
//! past this boundary: any provider, network, or parse failure is logged and
//! degraded to [`ANALYSIS_FALLBACK`] so a bad image or a provider outage can
//! never crash the caller.
//!
//! API key: `CHROMA_VISION_API_KEY` (or `GEMINI_API_KEY`) in `.env`.

use crate::error::{VisionError, VisionResult};
use crate::image::EncodedImage;
use crate::prompt::OUTFIT_ANALYSIS_PROMPT;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const VISION_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-pro-vision";

/// Fixed user-facing sentence returned when analysis fails for any reason.
pub const ANALYSIS_FALLBACK: &str =
    "I'm sorry, I couldn't analyze your outfit. Please try again with a clearer image.";

// Gemini generateContent request/response shapes (camelCase on the wire)
#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for the external vision model.
pub struct VisionAnalyzer {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl VisionAnalyzer {
    /// Create an analyzer with the key from the environment. Fails fast with
    /// a descriptive error when no key is configured.
    pub fn from_env() -> VisionResult<Self> {
        let api_key = chroma_core::vision_api_key()?;
        Ok(Self::new(api_key))
    }

    /// Create an analyzer with an explicit API key.
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    /// Set the vision model (e.g. `gemini-pro-vision`).
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Analyze an outfit image, degrading to the fixed fallback sentence on
    /// any failure. Returned text is the model's, verbatim.
    pub async fn analyze(&self, image: &EncodedImage) -> String {
        match self.try_analyze(image).await {
            Ok(text) => {
                info!(target: "chroma::vision", "Analysis complete ({} chars)", text.len());
                text
            }
            Err(e) => {
                warn!(target: "chroma::vision", "Analysis failed, degrading to fallback: {}", e);
                ANALYSIS_FALLBACK.to_string()
            }
        }
    }

    /// Single-attempt provider call.
    pub async fn try_analyze(&self, image: &EncodedImage) -> VisionResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            VISION_API_BASE, self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text(OUTFIT_ANALYSIS_PROMPT.to_string()),
                    Part::InlineData(InlineData {
                        mime_type: image.mime_type.clone(),
                        data: image.data.clone(),
                    }),
                ],
            }],
        };

        let res = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| VisionError::Request(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(VisionError::Provider { status, body });
        }

        let parsed: GenerateResponse = res
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(VisionError::EmptyResponse);
        }
        Ok(text)
    }
}
