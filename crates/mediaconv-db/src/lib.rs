//! Mediaconv Database Layer
//!
//! Repositories for gateway credentials, the file catalog, saved pipelines
//! and jobs, plus the job notification channel the worker listens on.
//!
// Module declarations
pub mod db;

// Re-exports: Repository traits and Postgres implementations
pub use db::{
    CredentialRepository, FileRepository, JobRepository, JobTransition, PgCredentialRepository,
    PgFileRepository, PgJobRepository, PgPipelineRepository, PipelineRepository, Repositories,
};

// Re-exports: In-memory catalog
pub use db::memory::InMemoryCatalog;

// Re-exports: Notifications
pub use db::notify::{
    InMemoryJobNotifier, JobNotifier, JobSubscription, PgJobNotifier, JOB_NOTIFY_CHANNEL,
};

// Re-exports: Pool setup
pub use db::pool::setup_database;
