//! Axum gateway: WebSocket voice endpoint over the mediation core.
//!
//! Wires the cognition services (OpenAI-compatible STT/LLM/TTS, with
//! placeholders when no keys are configured), the SQLite conversation store,
//! and token auth into per-call sessions.

mod config;
mod store;
mod ws;

use aria_voice::{
    AuthService, Cognition, LlmService, OpenAiLlm, OpenAiStt, OpenAiTts, PlaceholderLlm,
    PlaceholderStt, PlaceholderTts, SttService, TtsService,
};
use axum::{routing::get, Router};
use config::GatewayConfig;
use std::sync::Arc;
use store::{SqliteAuth, SqliteStore};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub services: Cognition,
    pub auth: Arc<dyn AuthService>,
}

fn build_services(store: Arc<SqliteStore>) -> Cognition {
    let stt: Arc<dyn SttService> = match OpenAiStt::from_env() {
        Ok(s) => {
            info!(model = %s.model, "STT: cloud backend");
            Arc::new(s)
        }
        Err(e) => {
            warn!("STT: {e}; using placeholder");
            Arc::new(PlaceholderStt::new())
        }
    };
    let llm: Arc<dyn LlmService> = match OpenAiLlm::from_env() {
        Ok(l) => {
            info!(model = %l.model, "LLM: cloud backend");
            Arc::new(l)
        }
        Err(e) => {
            warn!("LLM: {e}; using placeholder");
            Arc::new(PlaceholderLlm)
        }
    };
    let tts: Arc<dyn TtsService> = match OpenAiTts::from_env() {
        Ok(t) => {
            info!(model = %t.model, "TTS: cloud backend");
            Arc::new(t)
        }
        Err(e) => {
            warn!("TTS: {e}; using placeholder");
            Arc::new(PlaceholderTts::new())
        }
    };
    Cognition {
        stt,
        llm,
        tts,
        store,
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(GatewayConfig::from_env()?);
    let store = Arc::new(SqliteStore::new(&config.db_path)?);
    info!(db = %store.path().display(), "conversation store ready");
    if let Some(ref token) = config.dev_token {
        let id = store.ensure_user("dev@localhost", "!", token)?;
        info!(user_id = id, "dev user provisioned from ARIA_DEV_TOKEN");
    }
    let auth: Arc<dyn AuthService> = Arc::new(SqliteAuth::new(Arc::clone(&store)));
    let services = build_services(store);

    let state = AppState {
        config: Arc::clone(&config),
        services,
        auth,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("gateway listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
