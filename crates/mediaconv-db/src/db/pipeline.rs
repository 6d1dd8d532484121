//! Saved pipeline repository

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use mediaconv_core::models::{NewPipeline, PipelineRecord};
use mediaconv_core::AppResult;

use super::conflict_or_database;

#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Save a pipeline. A duplicate (user, name) is a `Conflict`.
    async fn create(&self, pipeline: NewPipeline) -> AppResult<PipelineRecord>;

    async fn get(&self, id: i64) -> AppResult<Option<PipelineRecord>>;

    async fn find_by_name(&self, user_id: i64, name: &str) -> AppResult<Option<PipelineRecord>>;

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<PipelineRecord>>;
}

#[derive(Clone)]
pub struct PgPipelineRepository {
    pool: PgPool,
}

impl PgPipelineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineRepository for PgPipelineRepository {
    #[tracing::instrument(skip(self, pipeline), fields(user_id = pipeline.user_id, name = %pipeline.name))]
    async fn create(&self, pipeline: NewPipeline) -> AppResult<PipelineRecord> {
        let row = sqlx::query_as::<Postgres, PipelineRecord>(
            r#"
            INSERT INTO pipelines (user_id, name, format, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, format, content, created_at
            "#,
        )
        .bind(pipeline.user_id)
        .bind(&pipeline.name)
        .bind(pipeline.format)
        .bind(&pipeline.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_database(e, &format!("pipeline already exists: {}", pipeline.name))
        })?;
        Ok(row)
    }

    async fn get(&self, id: i64) -> AppResult<Option<PipelineRecord>> {
        let row = sqlx::query_as::<Postgres, PipelineRecord>(
            "SELECT id, user_id, name, format, content, created_at FROM pipelines WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_name(&self, user_id: i64, name: &str) -> AppResult<Option<PipelineRecord>> {
        let row = sqlx::query_as::<Postgres, PipelineRecord>(
            r#"
            SELECT id, user_id, name, format, content, created_at
            FROM pipelines
            WHERE user_id = $1 AND name = $2
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<PipelineRecord>> {
        let rows = sqlx::query_as::<Postgres, PipelineRecord>(
            r#"
            SELECT id, user_id, name, format, content, created_at
            FROM pipelines
            WHERE user_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
