//! Catalog models persisted in PostgreSQL.

pub mod credential;
pub mod file;
pub mod job;
pub mod pipeline;

pub use credential::{Credential, NewCredential, MAX_ACTIVE_CREDENTIALS};
pub use file::{File, NewFile};
pub use job::{Actor, Job, JobResult, JobStatus, JobStatusHistory, NewJob};
pub use pipeline::{NewPipeline, PipelineFormat, PipelineRecord};
