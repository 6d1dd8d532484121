//! Mediaconv Worker
//!
//! Subscribes to job notifications and runs each announced job's pipeline:
//! download the input, execute the steps with the external tools, upload
//! the outputs under `users/{user_id}/results/job-{job_id}/`, and record the
//! terminal status.

pub mod processor;
pub mod queue;

pub use processor::{JobProcessor, NO_PIPELINE_SPECIFIED};
pub use queue::JobWorker;
