//! Application setup and initialization

pub mod routes;
pub mod server;

use anyhow::{Context, Result};
use mediaconv_core::Config;
use mediaconv_services::ServiceContext;

use crate::state::AppState;

/// Validate config, start telemetry, connect the catalog and storage, and
/// build the router.
pub async fn initialize_app(config: Config) -> Result<(AppState, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    mediaconv_infra::init_telemetry("mediaconv-api")
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let ctx = ServiceContext::connect(config.clone()).await?;
    let state = AppState::new(ctx);
    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
