//! Service configuration loaded from defaults, an optional config file, and
//! `CHROMA_*` environment variables.
//!
//! Non-secret settings (port, app name) live in `CoreConfig`. Secrets (vision
//! API key, voice service keys) are read from the environment at first use and
//! fail with a descriptive error when absent.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_reconnect_delay_secs() -> u64 {
    3
}

/// Gateway configuration.
///
/// | Env | Default | Description |
/// |-----|---------|--------------|
/// | CHROMA__APP_NAME | Chroma Gateway | Application identity. |
/// | CHROMA__PORT | 8000 | HTTP port for the gateway. |
/// | CHROMA__RECONNECT_DELAY_SECS | 3 | Fixed delay before a voice reconnect attempt. |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity shown in logs and the health endpoint.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Fixed delay (seconds) before an automatic voice reconnect attempt.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl CoreConfig {
    pub fn load() -> CoreResult<Self> {
        let config_path =
            std::env::var("CHROMA_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Chroma Gateway")?
            .set_default("port", 8000_i64)?
            .set_default("reconnect_delay_secs", 3_i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("CHROMA").separator("__"))
            .build()?;

        Ok(built.try_deserialize()?)
    }
}

/// Secret key for the external vision model. `CHROMA_VISION_API_KEY`, with
/// `GEMINI_API_KEY` as a legacy alias.
pub fn vision_api_key() -> CoreResult<String> {
    require_env_any(&["CHROMA_VISION_API_KEY", "GEMINI_API_KEY"])
}

/// Public client key for the voice service (`CHROMA_VOICE_PUBLIC_KEY`).
pub fn voice_public_key() -> CoreResult<String> {
    require_env_any(&["CHROMA_VOICE_PUBLIC_KEY"])
}

/// Assistant identifier for the voice service (`CHROMA_VOICE_ASSISTANT_ID`).
pub fn voice_assistant_id() -> CoreResult<String> {
    require_env_any(&["CHROMA_VOICE_ASSISTANT_ID"])
}

fn require_env_any(names: &[&str]) -> CoreResult<String> {
    for name in names {
        if let Ok(v) = std::env::var(name) {
            let v = v.trim().to_string();
            if !v.is_empty() {
                return Ok(v);
            }
        }
    }
    Err(CoreError::MissingConfig(format!(
        "set {} in the environment or .env",
        names[0]
    )))
}
