//! Mediaconv Core Library
//!
//! Domain models, error types, configuration, pipeline definitions and the
//! SigV4 signing codec shared by every mediaconv component.

pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod sigv4;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, ServiceConfig, ToolPaths};
pub use error::{AppError, AppResult, ErrorMetadata, LogLevel};
pub use models::{
    Actor, Credential, File, Job, JobResult, JobStatus, JobStatusHistory, PipelineFormat,
    PipelineRecord,
};
pub use pipeline::{Operation, PipelineDefinition, Step, StepParams, ThumbnailType};
pub use storage_types::StorageBackend;
