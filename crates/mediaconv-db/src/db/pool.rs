//! Catalog connection pool.

use anyhow::{Context, Result};
use mediaconv_core::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Migrations under the workspace `migrations/` directory, embedded at
/// compile time.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Connect to `DATABASE_URL` and bring the schema up to date.
///
/// Every binary calls this on startup; applied migrations are skipped, so
/// the gateway and worker can start in any order.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    tracing::info!("Connecting to catalog database");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .connect(config.database_url())
        .await
        .context("Failed to connect to database")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Catalog ready"
    );
    Ok(pool)
}
