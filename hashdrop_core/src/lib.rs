//! Content-addressed upload store: deduplicating image uploads kept on disk
//! for a bounded lifetime, plus the axum routes that expose it.

pub mod config;
pub mod error;
pub mod files;
pub mod handlers;
pub mod metrics;
pub mod middleware;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use files::{
    ContentStore, FileManager, FileManagerConfig, FileValidator, ObjectKey, RetentionSweeper,
    StoreOutcome, SweepReport, UploadResult, ValidationOutcome,
};
pub use handlers::routes::create_routes;
pub use metrics::UploadMetrics;

use anyhow::Context;
use axum::{extract::DefaultBodyLimit, Router};
use std::{net::SocketAddr, time::Duration};
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::config::ServerConfig;

/// Room for multipart boundaries and part headers on top of the file itself.
pub const MULTIPART_ENVELOPE_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub file_manager: FileManager,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(FileManager::with_default_config())
    }
}

impl AppState {
    pub fn new(file_manager: FileManager) -> Self {
        Self {
            app_name: "hashdrop".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            file_manager,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(FileManager::new(FileManagerConfig::from(&config.storage)))
    }
}

pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, &ServerConfig::default())
}

pub fn create_app_with_config(state: AppState, config: &ServerConfig) -> Router {
    let max_file_size = usize::try_from(state.file_manager.validator().max_file_size())
        .unwrap_or(usize::MAX);
    let body_limit = max_file_size.saturating_add(MULTIPART_ENVELOPE_BYTES);

    let router = Router::new()
        .merge(create_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_seconds)));

    middleware::logging::apply_logging(router).with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
