//! Loot screenshot tally service.
//!
//! Screenshots of the in-game loot log are uploaded over HTTP, run through
//! OCR, and every recognized line is matched against a catalog of known
//! drops. Matches are counted and valued with exact decimal arithmetic.

pub mod error;
pub mod models;
pub mod server;
pub mod services;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use models::config::{AppConfig, LogFormat, LoggingConfig};

/// Install the global tracing subscriber. `RUST_LOG` wins over the config filter.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Run the upload server until shutdown
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        "loot-tally {} (ocr engine: {:?}, failure policy: {:?})",
        env!("CARGO_PKG_VERSION"),
        config.ocr.engine,
        config.batch.failure_policy
    );

    server::serve(&config).await
}
