//! Job repository
//!
//! Every status change goes through [`JobRepository::transition`], which
//! updates the job and appends its history row in one transaction. The
//! update is conditional on the status the caller observed, so a concurrent
//! change makes the transition return `None` instead of overwriting it.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use mediaconv_core::models::{Actor, Job, JobStatus, JobStatusHistory, NewJob};
use mediaconv_core::AppResult;

/// A requested status change and the history row that records it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTransition {
    pub from: JobStatus,
    pub to: JobStatus,
    pub actor: Actor,
    pub message: String,
    /// Replaces the stored error when set.
    pub error: Option<String>,
    /// Replaces the stored result when set.
    pub result: Option<serde_json::Value>,
}

impl JobTransition {
    pub fn new(from: JobStatus, to: JobStatus, actor: Actor, message: impl Into<String>) -> Self {
        Self {
            from,
            to,
            actor,
            message: message.into(),
            error: None,
            result: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a pending job and its creation history row.
    async fn create(&self, job: NewJob, actor: Actor, message: &str) -> AppResult<Job>;

    async fn get(&self, id: i64) -> AppResult<Option<Job>>;

    /// Apply `transition` if the job is still in `transition.from`.
    /// `finished_at` is set when the target status is terminal.
    async fn transition(&self, job_id: i64, transition: JobTransition) -> AppResult<Option<Job>>;

    /// History rows in insertion order.
    async fn history(&self, job_id: i64) -> AppResult<Vec<JobStatusHistory>>;
}

#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const JOB_COLUMNS: &str = "id, file_id, pipeline_id, pipeline_snapshot, status, error, result, \
                           created_at, updated_at, finished_at";

#[async_trait]
impl JobRepository for PgJobRepository {
    #[tracing::instrument(skip(self, job), fields(file_id = job.file_id))]
    async fn create(&self, job: NewJob, actor: Actor, message: &str) -> AppResult<Job> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            INSERT INTO jobs (file_id, pipeline_id, pipeline_snapshot, status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(job.file_id)
        .bind(job.pipeline_id)
        .bind(job.pipeline_snapshot.as_ref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, file_id = job.file_id, "Failed to insert job");
            e
        })?;

        sqlx::query(
            r#"
            INSERT INTO job_status_history (job_id, from_status, to_status, message, actor)
            VALUES ($1, NULL, $2, $3, $4)
            "#,
        )
        .bind(created.id)
        .bind(JobStatus::Pending)
        .bind(message)
        .bind(actor)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(job_id = created.id, "Job inserted");
        Ok(created)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Job>> {
        let job = sqlx::query_as::<Postgres, Job>(&format!(
            "SELECT {} FROM jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    #[tracing::instrument(skip(self, transition), fields(from = %transition.from, to = %transition.to))]
    async fn transition(&self, job_id: i64, transition: JobTransition) -> AppResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = $3,
                error = COALESCE($4, error),
                result = COALESCE($5, result),
                finished_at = CASE WHEN $6 THEN NOW() ELSE finished_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(transition.from)
        .bind(transition.to)
        .bind(transition.error.as_deref())
        .bind(transition.result.as_ref())
        .bind(transition.to.is_terminal())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO job_status_history (job_id, from_status, to_status, message, actor)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job_id)
        .bind(transition.from)
        .bind(transition.to)
        .bind(&transition.message)
        .bind(transition.actor)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(job))
    }

    async fn history(&self, job_id: i64) -> AppResult<Vec<JobStatusHistory>> {
        let rows = sqlx::query_as::<Postgres, JobStatusHistory>(
            r#"
            SELECT id, job_id, from_status, to_status, message, actor, created_at
            FROM job_status_history
            WHERE job_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
