mod assets;
mod cors;
mod error;
mod handlers;

use crate::config::Config;
use crate::media::MediaService;
use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    media: Arc<MediaService>,
    static_root: Option<Arc<PathBuf>>,
}

impl AppState {
    pub fn new(media: MediaService, static_root: Option<PathBuf>) -> Self {
        Self {
            media: Arc::new(media),
            static_root: static_root.map(Arc::new),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::liveness))
        .route("/api/info", post(handlers::info))
        .route("/api/download", post(handlers::download))
        .fallback(assets::fallback)
        .layer(middleware::from_fn(cors::permissive))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let media = MediaService::from_config(&config.adapter);

    // The server still starts so the tool can be installed without a restart.
    if let Err(e) = media.test_setup().await {
        warn!("Extraction tool test failed: {:#}", e);
    }

    let static_root = config.static_root().map(Path::to_path_buf);
    match &static_root {
        Some(dir) => info!("Serving static files from {}", dir.display()),
        None => info!("No static directory, serving the API only"),
    }

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, router(AppState::new(media, static_root)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down, waiting for open downloads to finish");
}
