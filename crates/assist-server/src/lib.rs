//! Assist HTTP server
//!
//! Routes:
//! - `GET /health` - liveness plus which capabilities are configured
//! - `POST /api/chat` - chat turn, JSON or server-sent events
//! - `GET /api/tools` - tool declarations offered to the model
//! - everything else - static files

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, http::Method, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use assist_core::agent::OrchestratorConfig;
use assist_core::ai::{AiClient, ChatProvider};
use assist_core::retrieval::{Embedder, OpenAiEmbedder, PineconeStore, VectorStore};
use assist_core::tools::{register_builtin_tools, register_search_tool, ToolRegistry};
use assist_core::{Capability, Settings};

pub mod error;
mod routes;
pub mod types;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub chat: Capability<Arc<dyn ChatProvider>>,
    pub tool_registry: Arc<ToolRegistry>,
    pub orchestrator_config: OrchestratorConfig,
    pub retrieval_enabled: bool,
}

/// Build collaborators from settings. Missing credentials leave the
/// matching capability disabled instead of failing.
pub async fn build_state(settings: &Settings) -> Result<AppState> {
    let chat: Capability<Arc<dyn ChatProvider>> = match &settings.chat {
        Capability::Available(chat) => {
            let client = AiClient::new(chat.client.clone(), chat.api_key.clone())?;
            info!("Chat enabled with model {}", chat.client.model);
            Capability::Available(Arc::new(client))
        }
        Capability::Unavailable(reason) => Capability::Unavailable(reason.clone()),
    };

    let tool_registry = Arc::new(ToolRegistry::with_timeout(settings.agent.tool_timeout));
    register_builtin_tools(&tool_registry).await?;

    let retrieval_enabled = match (
        settings.embeddings.as_option(),
        settings.vector_store.as_option(),
    ) {
        (Some(embeddings), Some(vector_store)) => {
            let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(embeddings)?);
            let store: Arc<dyn VectorStore> = Arc::new(PineconeStore::new(vector_store)?);
            register_search_tool(&tool_registry, embedder, store).await?;
            true
        }
        _ => false,
    };

    info!(
        "Registered {} tools (document search {})",
        tool_registry.len().await,
        if retrieval_enabled { "enabled" } else { "disabled" }
    );

    Ok(AppState {
        chat,
        tool_registry,
        orchestrator_config: OrchestratorConfig::from(&settings.agent),
        retrieval_enabled,
    })
}

/// Build the router with all routes
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api_router())
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and serve until the listener fails
pub async fn start_server(settings: Settings) -> Result<()> {
    let state = build_state(&settings).await?;
    let app = build_router(state, &settings.server.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Assist server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    features: HashMap<String, bool>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut features = HashMap::new();
    features.insert("chat".to_string(), state.chat.is_available());
    features.insert("retrieval".to_string(), state.retrieval_enabled);

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        features,
    })
}
