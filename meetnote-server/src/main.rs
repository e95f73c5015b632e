//! meetnote-server - realtime meeting analysis service
//!
//! Serves the meeting/analysis REST API and the `/hubs/meeting` SSE channel
//! that streams job progress to every connected browser.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meetnote_common::config::{ensure_root_folder, load_config, ROOT_FOLDER_ENV};
use meetnote_server::config::{CliOverrides, ServerConfig};
use meetnote_server::db::{init_database_pool, SqliteStore};
use meetnote_server::hub::BroadcastHub;
use meetnote_server::orchestrator::JobOrchestrator;
use meetnote_server::{build_providers, build_router, shutdown_hub_on, AppState};

/// Command-line arguments for meetnote-server
#[derive(Parser, Debug)]
#[command(name = "meetnote-server")]
#[command(about = "Realtime meeting analysis service")]
#[command(version)]
struct Args {
    /// Explicit config file (default: ~/.config/meetnote/config.toml)
    #[arg(short, long, env = "MEETNOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "MEETNOTE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MEETNOTE_PORT")]
    port: Option<u16>,

    /// Folder holding meetnote.db
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Browser origin allowed to call the API
    #[arg(long, env = "MEETNOTE_CORS_ORIGIN")]
    cors_origin: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Pause between progress phases in milliseconds
    #[arg(long, env = "MEETNOTE_PHASE_DELAY_MS")]
    phase_delay_ms: Option<u64>,
}

impl From<&Args> for CliOverrides {
    fn from(args: &Args) -> Self {
        Self {
            host: args.host.clone(),
            port: args.port,
            root_folder: args.root_folder.clone(),
            cors_origin: args.cors_origin.clone(),
            openai_api_key: args.openai_api_key.clone(),
            phase_delay_ms: args.phase_delay_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meetnote_server=info,meetnote_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting meetnote-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let toml_config = load_config(args.config.as_deref()).context("Failed to load config")?;
    let config = ServerConfig::resolve(&CliOverrides::from(&args), &toml_config);
    config.log_summary();

    let db_path = ensure_root_folder(&config.root_folder)
        .context("Failed to initialize root folder")?;
    info!("Database: {}", db_path.display());

    let db_pool = init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let hub = BroadcastHub::new(config.hub);
    let (analysis, transcriber) = build_providers(config.openai.clone());
    if config.openai.is_none() {
        warn!("Detailed analysis and transcription are unavailable without an API key");
    }

    let orchestrator = JobOrchestrator::new(
        hub.clone(),
        analysis,
        transcriber,
        Arc::new(SqliteStore::new(db_pool.clone())),
        config.orchestrator,
    );

    let state = AppState::new(db_pool.clone(), hub.clone(), orchestrator)
        .with_keep_alive(config.keep_alive)
        .with_cors_origin(config.cors_origin.clone());
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Realtime hub: http://{}/hubs/meeting", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_hub_on(shutdown_signal(), hub))
        .await
        .context("Server error")?;

    db_pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
