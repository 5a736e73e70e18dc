//! HTTP server hosting the upload page and the JSON API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{Config, SampleRatePolicy};
use crate::enhancement::SpeechEnhancer;

use super::handlers;

/// Shared state for the request handlers
#[derive(Clone)]
pub struct AppState {
    pub enhancer: Arc<Mutex<SpeechEnhancer>>,
    /// Read without taking the enhancer lock
    pub model_name: Arc<str>,
    pub sample_rate_policy: SampleRatePolicy,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(enhancer: SpeechEnhancer, config: &Config) -> Self {
        let model_name: Arc<str> = Arc::from(enhancer.model_name());
        Self {
            enhancer: Arc::new(Mutex::new(enhancer)),
            model_name,
            sample_rate_policy: config.sample_rate_policy,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Build the router with all routes and layers
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/enhance", post(handlers::enhance_page))
        .route("/api/enhance", post(handlers::enhance_api))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve until ctrl-c
pub async fn start_server(config: &Config, enhancer: SpeechEnhancer) -> anyhow::Result<()> {
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        anyhow::anyhow!("Invalid bind address '{}': {}", config.bind_addr, e)
    })?;

    let state = AppState::new(enhancer, config);
    info!(
        "Speech enhancement server starting on http://{} (model: {})",
        addr, state.model_name
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind server to {}: {}", addr, e);
        anyhow::anyhow!("Failed to bind {}: {}", addr, e)
    })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
