//! Database repositories for data access layer
//!
//! Each repository is an `async_trait` with a Postgres implementation next to
//! it. `memory` implements every trait over in-process maps for tests and
//! local development.
//
// Gateway credentials
pub mod credential;
//
// File catalog
pub mod file;
//
// Jobs and their status history
pub mod job;
//
// In-memory catalog
pub mod memory;
//
// LISTEN/NOTIFY and broadcast notifiers
pub mod notify;
//
// Saved pipelines
pub mod pipeline;
//
// Connection pool and migrations
pub mod pool;

use std::sync::Arc;

use sqlx::PgPool;

pub use credential::{CredentialRepository, PgCredentialRepository};
pub use file::{FileRepository, PgFileRepository};
pub use job::{JobRepository, JobTransition, PgJobRepository};
pub use pipeline::{PgPipelineRepository, PipelineRepository};

use mediaconv_core::AppError;

/// The full set of repositories a component needs, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub credentials: Arc<dyn CredentialRepository>,
    pub files: Arc<dyn FileRepository>,
    pub pipelines: Arc<dyn PipelineRepository>,
    pub jobs: Arc<dyn JobRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            credentials: Arc::new(PgCredentialRepository::new(pool.clone())),
            files: Arc::new(PgFileRepository::new(pool.clone())),
            pipelines: Arc::new(PgPipelineRepository::new(pool.clone())),
            jobs: Arc::new(PgJobRepository::new(pool)),
        }
    }

    pub fn in_memory(catalog: memory::InMemoryCatalog) -> Self {
        Self {
            credentials: Arc::new(catalog.clone()),
            files: Arc::new(catalog.clone()),
            pipelines: Arc::new(catalog.clone()),
            jobs: Arc::new(catalog),
        }
    }
}

/// Maps a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_or_database(err: sqlx::Error, conflict_message: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::Conflict(conflict_message.to_string());
        }
    }
    AppError::Database(err)
}
