//! meetnote-server library interface
//!
//! Realtime meeting analysis: the broadcast hub, the job orchestrator, the
//! capabilities it drives, and the HTTP API. Exposed as a library so
//! integration tests can build the router around in-process fakes.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod hub;
pub mod orchestrator;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::hub::BroadcastHub;
use crate::orchestrator::JobOrchestrator;
use crate::services::{
    AnalysisProvider, OpenAiClient, OpenAiConfig, Transcriber, UnconfiguredProvider,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Realtime connection registry
    pub hub: BroadcastHub,
    /// Analysis job driver (publishes to `hub`)
    pub orchestrator: JobOrchestrator,
    /// SSE keep-alive interval
    pub keep_alive: Duration,
    /// Browser origin allowed by CORS, if any
    pub cors_origin: Option<String>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, hub: BroadcastHub, orchestrator: JobOrchestrator) -> Self {
        Self {
            db,
            hub,
            orchestrator,
            keep_alive: config::DEFAULT_KEEP_ALIVE,
            cors_origin: None,
            startup_time: Utc::now(),
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = Some(origin.into());
        self
    }
}

/// Analysis and transcription capabilities for the given provider settings
///
/// Falls back to [`UnconfiguredProvider`] when no key is set or the client
/// cannot be built.
pub fn build_providers(
    openai: Option<OpenAiConfig>,
) -> (Arc<dyn AnalysisProvider>, Arc<dyn Transcriber>) {
    if let Some(config) = openai {
        match OpenAiClient::new(config) {
            Ok(client) => {
                let client = Arc::new(client);
                let analysis: Arc<dyn AnalysisProvider> = client.clone();
                let transcriber: Arc<dyn Transcriber> = client;
                return (analysis, transcriber);
            }
            Err(e) => tracing::warn!("OpenAI client unavailable: {}", e),
        }
    }
    let placeholder = Arc::new(UnconfiguredProvider);
    let analysis: Arc<dyn AnalysisProvider> = placeholder.clone();
    let transcriber: Arc<dyn Transcriber> = placeholder;
    (analysis, transcriber)
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    match origin.parse::<HeaderValue>() {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true),
        ),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
            None
        }
    }
}

/// Wait for `signal`, then close every hub connection
///
/// Open SSE streams only finish once their hub connection is gone, and
/// graceful shutdown waits for in-flight responses.
pub async fn shutdown_hub_on<F>(signal: F, hub: BroadcastHub)
where
    F: Future<Output = ()>,
{
    signal.await;
    let closed = hub.close_all();
    tracing::info!(closed, "Realtime connections closed for shutdown");
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = state.cors_origin.as_deref().and_then(cors_layer);

    let router = Router::new()
        .merge(api::analysis_routes())
        .merge(api::meeting_routes())
        .merge(api::hub_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}
