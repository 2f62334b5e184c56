//! Potability service - serves water potability predictions over HTTP
//!
//! Loads the artifact set from the configured model directory at startup,
//! falling back to the rule-based classifier when none is present.

use anyhow::Result;
use potability_lib::{
    health::HealthRegistry, observability::StructuredLogger, predictor::PredictionEngine,
};
use potability_service::{api, ServiceConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load()?;

    // Initialize tracing with JSON output; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(fmt::layer().json())
        .init();

    info!(
        model_dir = %config.model_dir.display(),
        auth = config.api_key.is_some(),
        "Starting potability-service"
    );

    let logger = StructuredLogger::new(&config.instance);

    // Loading parses and checksums artifact files
    let model_dir = config.model_dir.clone();
    let engine_logger = logger.clone();
    let engine = tokio::task::spawn_blocking(move || {
        let engine = PredictionEngine::new(model_dir).with_logger(engine_logger);
        engine.load_or_fallback();
        engine
    })
    .await?;
    let engine = Arc::new(engine);

    let health_registry = HealthRegistry::new();
    health_registry.sync_with(&engine).await;

    logger.log_startup(api::SERVICE_VERSION, &engine.version(), config.api_port);

    let app_state = Arc::new(
        api::AppState::new(engine, health_registry.clone())
            .with_api_key(config.api_key.clone())
            .with_max_batch_size(config.max_batch_size),
    );

    health_registry.set_ready(true).await;

    api::serve(config.api_port, app_state, shutdown_signal()).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
