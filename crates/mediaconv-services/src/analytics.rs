//! Job analytics
//!
//! The worker reports status transitions and per-job metrics here. The
//! default sink emits structured events on the `mediaconv::analytics` target;
//! nothing is stored or queried.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use mediaconv_core::models::{Actor, JobStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEvent {
    pub job_id: i64,
    pub from: Option<JobStatus>,
    pub to: JobStatus,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobMetric {
    pub job_id: i64,
    pub name: &'static str,
    pub value: f64,
}

impl JobMetric {
    pub fn new(job_id: i64, name: &'static str, value: f64) -> Self {
        Self {
            job_id,
            name,
            value,
        }
    }
}

#[async_trait]
pub trait JobAnalytics: Send + Sync {
    async fn record_transition(&self, event: &TransitionEvent);

    async fn record_job_metric(&self, metric: &JobMetric);
}

/// Emits analytics as tracing events.
#[derive(Debug, Clone, Default)]
pub struct TracingAnalytics;

#[async_trait]
impl JobAnalytics for TracingAnalytics {
    async fn record_transition(&self, event: &TransitionEvent) {
        tracing::info!(
            target: "mediaconv::analytics",
            job_id = event.job_id,
            from = ?event.from,
            to = %event.to,
            actor = %event.actor,
            at = %event.at.to_rfc3339(),
            "job_transition"
        );
    }

    async fn record_job_metric(&self, metric: &JobMetric) {
        tracing::info!(
            target: "mediaconv::analytics",
            job_id = metric.job_id,
            metric = metric.name,
            value = metric.value,
            "job_metric"
        );
    }
}

/// Used when `ANALYTICS_ENABLED` is off.
#[derive(Debug, Clone, Default)]
pub struct NoopAnalytics;

#[async_trait]
impl JobAnalytics for NoopAnalytics {
    async fn record_transition(&self, _event: &TransitionEvent) {}

    async fn record_job_metric(&self, _metric: &JobMetric) {}
}

/// Keeps everything it receives, for assertions in tests.
#[derive(Clone, Default)]
pub struct RecordingAnalytics {
    transitions: Arc<Mutex<Vec<TransitionEvent>>>,
    metrics: Arc<Mutex<Vec<JobMetric>>>,
}

impl RecordingAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transitions(&self) -> Vec<TransitionEvent> {
        self.transitions.lock().await.clone()
    }

    pub async fn metrics(&self) -> Vec<JobMetric> {
        self.metrics.lock().await.clone()
    }
}

#[async_trait]
impl JobAnalytics for RecordingAnalytics {
    async fn record_transition(&self, event: &TransitionEvent) {
        self.transitions.lock().await.push(event.clone());
    }

    async fn record_job_metric(&self, metric: &JobMetric) {
        self.metrics.lock().await.push(metric.clone());
    }
}

pub fn analytics_from_config(enabled: bool) -> Arc<dyn JobAnalytics> {
    if enabled {
        Arc::new(TracingAnalytics)
    } else {
        Arc::new(NoopAnalytics)
    }
}
