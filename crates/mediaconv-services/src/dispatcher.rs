//! Job dispatcher
//!
//! Owns the job state machine:
//!
//! ```text
//! pending -> processing -> completed | failed
//! pending | processing -> canceled
//! ```
//!
//! Every transition updates the job and appends one history row tagged with
//! the actor that caused it. New jobs are announced by publishing their id.

use std::sync::Arc;

use chrono::Utc;

use mediaconv_core::models::{Actor, Job, JobResult, JobStatus, JobStatusHistory, NewJob};
use mediaconv_core::{AppError, AppResult};
use mediaconv_db::{FileRepository, JobNotifier, JobRepository, JobTransition};

use crate::analytics::{JobAnalytics, TransitionEvent};

pub const CANCELLED_BY_USER: &str = "Job cancelled by user";
pub const CREATED_VIA_RERUN: &str = "Job created via rerun";
pub const WORKER_STARTED: &str = "Worker started processing";
pub const JOB_COMPLETED: &str = "Job completed successfully";

/// Where a job's pipeline comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineSource {
    Saved(i64),
    /// Inline definition as JSON.
    Snapshot(serde_json::Value),
}

#[derive(Clone)]
pub struct JobDispatcher {
    jobs: Arc<dyn JobRepository>,
    files: Arc<dyn FileRepository>,
    notifier: Arc<dyn JobNotifier>,
    analytics: Arc<dyn JobAnalytics>,
}

impl JobDispatcher {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        files: Arc<dyn FileRepository>,
        notifier: Arc<dyn JobNotifier>,
        analytics: Arc<dyn JobAnalytics>,
    ) -> Self {
        Self {
            jobs,
            files,
            notifier,
            analytics,
        }
    }

    /// Creates a pending job and publishes it. A publish failure is logged
    /// and the job stays pending.
    #[tracing::instrument(skip(self, source))]
    pub async fn create_job(
        &self,
        file_id: i64,
        source: PipelineSource,
        actor: Actor,
        message: &str,
    ) -> AppResult<Job> {
        let (pipeline_id, pipeline_snapshot) = match source {
            PipelineSource::Saved(id) => (Some(id), None),
            PipelineSource::Snapshot(value) => (None, Some(value)),
        };
        let job = self
            .jobs
            .create(
                NewJob {
                    file_id,
                    pipeline_id,
                    pipeline_snapshot,
                },
                actor,
                message,
            )
            .await?;

        tracing::info!(job_id = job.id, file_id = file_id, "Job created");

        if let Err(e) = self.publish(job.id).await {
            tracing::error!(error = %e, job_id = job.id, "Failed to publish job");
        }
        Ok(job)
    }

    pub async fn publish(&self, job_id: i64) -> AppResult<()> {
        self.notifier.publish(job_id).await
    }

    pub async fn get(&self, job_id: i64) -> AppResult<Job> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {} not found", job_id)))
    }

    /// Job and its history, oldest row first.
    pub async fn get_with_history(&self, job_id: i64) -> AppResult<(Job, Vec<JobStatusHistory>)> {
        let job = self.get(job_id).await?;
        let history = self.jobs.history(job_id).await?;
        Ok((job, history))
    }

    async fn get_owned(&self, user_id: i64, job_id: i64) -> AppResult<Job> {
        let job = self.get(job_id).await?;
        let file = self
            .files
            .get(job.file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", job.file_id)))?;
        if file.user_id != user_id {
            return Err(AppError::Forbidden("access denied".to_string()));
        }
        Ok(job)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, user_id: i64, job_id: i64) -> AppResult<Job> {
        let job = self.get_owned(user_id, job_id).await?;
        if job.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "Job cannot be cancelled (already {})",
                job.status
            )));
        }

        let transition =
            JobTransition::new(job.status, JobStatus::Canceled, Actor::User, CANCELLED_BY_USER)
                .with_error(CANCELLED_BY_USER);
        self.apply(&job, transition).await
    }

    /// Creates a new pending job from an existing one. The new job is not
    /// published; the original is left untouched.
    #[tracing::instrument(skip(self))]
    pub async fn rerun(&self, user_id: i64, job_id: i64) -> AppResult<Job> {
        let original = self.get_owned(user_id, job_id).await?;
        let job = self
            .jobs
            .create(
                NewJob {
                    file_id: original.file_id,
                    pipeline_id: original.pipeline_id,
                    pipeline_snapshot: original.pipeline_snapshot.clone(),
                },
                Actor::User,
                CREATED_VIA_RERUN,
            )
            .await?;
        tracing::info!(job_id = job.id, original_job_id = original.id, "Job rerun created");
        Ok(job)
    }

    pub async fn start_processing(&self, job: &Job) -> AppResult<Job> {
        let transition = JobTransition::new(
            job.status,
            JobStatus::Processing,
            Actor::Worker,
            WORKER_STARTED,
        );
        self.apply(job, transition).await
    }

    pub async fn complete(&self, job: &Job, output_keys: Vec<String>) -> AppResult<Job> {
        let result = serde_json::to_value(JobResult {
            output_files: output_keys,
            processed_at: Utc::now(),
        })
        .map_err(|e| AppError::Internal(format!("failed to encode job result: {}", e)))?;

        let transition = JobTransition::new(
            job.status,
            JobStatus::Completed,
            Actor::Worker,
            JOB_COMPLETED,
        )
        .with_result(result);
        self.apply(job, transition).await
    }

    pub async fn fail(&self, job: &Job, message: &str) -> AppResult<Job> {
        let transition = JobTransition::new(job.status, JobStatus::Failed, Actor::Worker, message)
            .with_error(message);
        self.apply(job, transition).await
    }

    async fn apply(&self, job: &Job, transition: JobTransition) -> AppResult<Job> {
        if !transition.from.can_transition_to(transition.to) {
            return Err(AppError::Validation(format!(
                "invalid job transition from {} to {}",
                transition.from, transition.to
            )));
        }

        let (from, to, actor) = (transition.from, transition.to, transition.actor);
        let updated = self
            .jobs
            .transition(job.id, transition)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "job {} is no longer {}",
                    job.id, from
                ))
            })?;

        tracing::info!(
            job_id = job.id,
            from = %from,
            to = %to,
            actor = %actor,
            "Job status changed"
        );

        if actor == Actor::Worker {
            self.analytics
                .record_transition(&TransitionEvent {
                    job_id: job.id,
                    from: Some(from),
                    to,
                    actor,
                    at: updated.updated_at,
                })
                .await;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::RecordingAnalytics;
    use mediaconv_core::models::NewFile;
    use mediaconv_db::{InMemoryCatalog, InMemoryJobNotifier};

    struct Fixture {
        catalog: InMemoryCatalog,
        notifier: InMemoryJobNotifier,
        analytics: RecordingAnalytics,
        dispatcher: JobDispatcher,
        file_id: i64,
    }

    async fn fixture() -> Fixture {
        let catalog = InMemoryCatalog::new();
        let notifier = InMemoryJobNotifier::new();
        let analytics = RecordingAnalytics::new();
        let dispatcher = JobDispatcher::new(
            Arc::new(catalog.clone()),
            Arc::new(catalog.clone()),
            Arc::new(notifier.clone()),
            Arc::new(analytics.clone()),
        );
        let file = catalog
            .upsert(NewFile {
                user_id: 1,
                original_name: "clip.mp4".to_string(),
                storage_key: "users/1/clip.mp4".to_string(),
                size: 3,
                content_type: "video/mp4".to_string(),
            })
            .await
            .unwrap();
        Fixture {
            catalog,
            notifier,
            analytics,
            dispatcher,
            file_id: file.id,
        }
    }

    async fn pending_job(f: &Fixture) -> Job {
        f.dispatcher
            .create_job(
                f.file_id,
                PipelineSource::Saved(99),
                Actor::User,
                "Job created from upload",
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_publishes_once() {
        let f = fixture().await;
        let job = pending_job(&f).await;

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.pipeline_id, Some(99));
        assert_eq!(f.notifier.published().await, vec![job.id]);

        let history = f.catalog.history(job.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_status, None);
        assert_eq!(history[0].message, "Job created from upload");
    }

    #[tokio::test]
    async fn test_cancel_pending_and_processing() {
        let f = fixture().await;

        let pending = pending_job(&f).await;
        let canceled = f.dispatcher.cancel(1, pending.id).await.unwrap();
        assert_eq!(canceled.status, JobStatus::Canceled);
        assert_eq!(canceled.error.as_deref(), Some(CANCELLED_BY_USER));
        assert!(canceled.finished_at.is_some());

        let job = pending_job(&f).await;
        let processing = f.dispatcher.start_processing(&job).await.unwrap();
        let canceled = f.dispatcher.cancel(1, processing.id).await.unwrap();
        assert_eq!(canceled.status, JobStatus::Canceled);

        let history = f.catalog.history(processing.id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.actor, Actor::User);
        assert_eq!(last.message, CANCELLED_BY_USER);
    }

    #[tokio::test]
    async fn test_cancel_terminal_is_rejected() {
        let f = fixture().await;

        let job = pending_job(&f).await;
        let job = f.dispatcher.start_processing(&job).await.unwrap();
        let done = f
            .dispatcher
            .complete(&job, vec!["users/1/results/job-1/a.jpg".to_string()])
            .await
            .unwrap();
        assert!(matches!(
            f.dispatcher.cancel(1, done.id).await,
            Err(AppError::Validation(_))
        ));

        let job = pending_job(&f).await;
        let job = f.dispatcher.start_processing(&job).await.unwrap();
        let failed = f.dispatcher.fail(&job, "boom").await.unwrap();
        assert!(matches!(
            f.dispatcher.cancel(1, failed.id).await,
            Err(AppError::Validation(ref m)) if m == "Job cannot be cancelled (already failed)"
        ));

        let job = pending_job(&f).await;
        let canceled = f.dispatcher.cancel(1, job.id).await.unwrap();
        assert!(matches!(
            f.dispatcher.cancel(1, canceled.id).await,
            Err(AppError::Validation(ref m)) if m == "Job cannot be cancelled (already canceled)"
        ));
    }

    #[tokio::test]
    async fn test_cancel_checks_owner_and_existence() {
        let f = fixture().await;
        let job = pending_job(&f).await;

        assert!(matches!(
            f.dispatcher.cancel(2, job.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            f.dispatcher.cancel(1, 12345).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rerun_creates_unpublished_copy() {
        let f = fixture().await;
        let original = pending_job(&f).await;
        let original = f.dispatcher.cancel(1, original.id).await.unwrap();

        let rerun = f.dispatcher.rerun(1, original.id).await.unwrap();
        assert_ne!(rerun.id, original.id);
        assert_eq!(rerun.status, JobStatus::Pending);
        assert_eq!(rerun.pipeline_id, original.pipeline_id);
        assert_eq!(rerun.file_id, original.file_id);
        // Only the original creation was published.
        assert_eq!(f.notifier.published().await, vec![original.id]);

        let history = f.catalog.history(rerun.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, CREATED_VIA_RERUN);
        assert_eq!(history[0].actor, Actor::User);

        let untouched = f.dispatcher.get(original.id).await.unwrap();
        assert_eq!(untouched.status, JobStatus::Canceled);
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let f = fixture().await;
        let job = pending_job(&f).await;

        let job = f.dispatcher.start_processing(&job).await.unwrap();
        let keys = vec!["users/1/results/job-1/thumb.jpg".to_string()];
        let done = f.dispatcher.complete(&job, keys.clone()).await.unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result_as().unwrap().output_files, keys);

        let (_, history) = f.dispatcher.get_with_history(done.id).await.unwrap();
        let messages: Vec<&str> = history.iter().map(|h| h.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["Job created from upload", WORKER_STARTED, JOB_COMPLETED]
        );

        let recorded = f.analytics.transitions().await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].to, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_invalid_transition() {
        let f = fixture().await;
        let job = pending_job(&f).await;
        assert!(matches!(
            f.dispatcher.complete(&job, vec![]).await,
            Err(AppError::Validation(_))
        ));
    }
}
