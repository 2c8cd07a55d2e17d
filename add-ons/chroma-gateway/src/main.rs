//! Axum-based API Gateway for Chroma: the HTTP edge in front of the vision
//! analysis relay and the voice session coordinator. Config-driven via
//! CoreConfig; secrets come from the environment and fail fast at startup.

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use chroma_core::CoreConfig;
use chroma_session::{Session, WireVoiceClient};
use chroma_vision::VisionAnalyzer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Gateway version from Cargo.toml, reported by the health endpoint.
pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state: one analyzer, one session. Holding exactly one
/// `Session` here is what enforces the single-active-session invariant.
pub struct AppState {
    pub config: CoreConfig,
    pub analyzer: VisionAnalyzer,
    pub session: Arc<Session>,
}

pub type SharedState = Arc<AppState>;

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/analyze-outfit", post(handlers::analyze::analyze_outfit))
        .route("/api/v1/session/start", post(handlers::session::start))
        .route("/api/v1/session/end", post(handlers::session::end))
        .route("/api/v1/session/mute", post(handlers::session::toggle_mute))
        .route("/api/v1/session/state", get(handlers::session::state))
        .route("/api/v1/session/transcript", get(handlers::session::transcript))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::load()?;
    info!(target: "chroma::gateway", "{} v{} starting", config.app_name, GATEWAY_VERSION);

    let analyzer = VisionAnalyzer::from_env()?;
    let voice_client = Arc::new(WireVoiceClient::from_env()?);
    let assistant_id = chroma_core::voice_assistant_id()?;

    let session = Arc::new(Session::new(
        voice_client,
        assistant_id,
        Duration::from_secs(config.reconnect_delay_secs),
    ));
    tokio::spawn(Arc::clone(&session).run());

    let port = config.port;
    let state: SharedState = Arc::new(AppState {
        config,
        analyzer,
        session,
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!(target: "chroma::gateway", "Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
