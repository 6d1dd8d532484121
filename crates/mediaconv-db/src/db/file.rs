//! File catalog repository

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use mediaconv_core::models::{File, NewFile};
use mediaconv_core::AppResult;

#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Record an upload. Re-uploading an existing key replaces the row's
    /// metadata and keeps its id.
    async fn upsert(&self, file: NewFile) -> AppResult<File>;

    /// Fetch by id, including deleted files still referenced by jobs.
    async fn get(&self, id: i64) -> AppResult<Option<File>>;

    async fn find_by_key(&self, storage_key: &str) -> AppResult<Option<File>>;

    /// Mark the file at `storage_key` deleted. Returns false if none was live.
    async fn delete_by_key(&self, user_id: i64, storage_key: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    #[tracing::instrument(skip(self, file), fields(storage_key = %file.storage_key))]
    async fn upsert(&self, file: NewFile) -> AppResult<File> {
        let row = sqlx::query_as::<Postgres, File>(
            r#"
            INSERT INTO files (user_id, original_name, storage_key, size, content_type)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (storage_key) DO UPDATE
            SET original_name = EXCLUDED.original_name,
                size = EXCLUDED.size,
                content_type = EXCLUDED.content_type,
                deleted_at = NULL
            RETURNING id, user_id, original_name, storage_key, size, content_type, created_at
            "#,
        )
        .bind(file.user_id)
        .bind(&file.original_name)
        .bind(&file.storage_key)
        .bind(file.size)
        .bind(&file.content_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get(&self, id: i64) -> AppResult<Option<File>> {
        let row = sqlx::query_as::<Postgres, File>(
            r#"
            SELECT id, user_id, original_name, storage_key, size, content_type, created_at
            FROM files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_key(&self, storage_key: &str) -> AppResult<Option<File>> {
        let row = sqlx::query_as::<Postgres, File>(
            r#"
            SELECT id, user_id, original_name, storage_key, size, content_type, created_at
            FROM files
            WHERE storage_key = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(storage_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_by_key(&self, user_id: i64, storage_key: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET deleted_at = NOW()
            WHERE user_id = $1 AND storage_key = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(storage_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
