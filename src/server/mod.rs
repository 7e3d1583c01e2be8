//! HTTP surface of the service.
//!
//! `POST /upload` takes multipart screenshots and answers with the
//! aggregated loot report. `/upload/base64`, `/api/catalog` and `/health`
//! are small companions for scripts and monitoring.

mod handlers;
mod routes;

pub use routes::create_router;

use anyhow::Context;
use std::sync::Arc;

use crate::models::config::AppConfig;
use crate::services::batch::BatchProcessor;
use crate::services::ocr::create_engine;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<BatchProcessor>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let engine = create_engine(&config.ocr)?;
        let processor = BatchProcessor::from_config(config, engine)?;

        Ok(Self {
            processor: Arc::new(processor),
        })
    }
}

/// Start the web server.
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let state = AppState::new(config)?;

    if let Err(e) = state.processor.engine().health_check().await {
        tracing::warn!("OCR engine is not ready yet: {}", e);
    }

    let app = create_router(state, config.server.max_upload_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Starting server at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
