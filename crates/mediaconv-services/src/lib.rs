//! Mediaconv Services Layer
//!
//! Business services shared by the gateway, the worker and the operator
//! CLI: the job dispatcher and its state machine, credential issuing, saved
//! pipelines and the analytics collaborator. Every service is built from an
//! explicit [`ServiceContext`]; nothing here is global.

pub mod analytics;
pub mod context;
pub mod credentials;
pub mod dispatcher;
pub mod pipelines;

pub use analytics::{
    analytics_from_config, JobAnalytics, JobMetric, NoopAnalytics, RecordingAnalytics,
    TracingAnalytics, TransitionEvent,
};
pub use context::ServiceContext;
pub use credentials::{BucketAvailability, CredentialService, IssuedCredential};
pub use dispatcher::{JobDispatcher, PipelineSource};
pub use pipelines::PipelineService;
