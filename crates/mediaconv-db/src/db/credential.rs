//! Gateway credential repository

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use mediaconv_core::models::{Credential, NewCredential};
use mediaconv_core::AppResult;

use super::conflict_or_database;

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Insert a credential. A taken bucket name or access key is a `Conflict`.
    async fn create(&self, credential: NewCredential) -> AppResult<Credential>;

    /// Active credential for an access key, used by the gateway authenticator.
    async fn find_active_by_access_key(&self, access_key: &str) -> AppResult<Option<Credential>>;

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Credential>>;

    async fn count_active(&self, user_id: i64) -> AppResult<i64>;

    /// Deactivate a credential owned by `user_id`. Returns false when no
    /// active credential matched.
    async fn deactivate(&self, user_id: i64, credential_id: i64) -> AppResult<bool>;

    /// Whether any credential, active or not, holds this bucket name.
    async fn bucket_exists(&self, bucket_name: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgCredentialRepository {
    pool: PgPool,
}

impl PgCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    #[tracing::instrument(skip(self, credential), fields(user_id = credential.user_id))]
    async fn create(&self, credential: NewCredential) -> AppResult<Credential> {
        let created = sqlx::query_as::<Postgres, Credential>(
            r#"
            INSERT INTO credentials (user_id, access_key, secret_key, bucket_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, access_key, secret_key, bucket_name, is_active,
                created_at, updated_at
            "#,
        )
        .bind(credential.user_id)
        .bind(&credential.access_key)
        .bind(&credential.secret_key)
        .bind(&credential.bucket_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_database(
                e,
                &format!("bucket name already taken: {}", credential.bucket_name),
            )
        })?;

        tracing::info!(
            credential_id = created.id,
            bucket = %created.bucket_name,
            "Credential created"
        );
        Ok(created)
    }

    async fn find_active_by_access_key(&self, access_key: &str) -> AppResult<Option<Credential>> {
        let credential = sqlx::query_as::<Postgres, Credential>(
            r#"
            SELECT id, user_id, access_key, secret_key, bucket_name, is_active,
                created_at, updated_at
            FROM credentials
            WHERE access_key = $1 AND is_active
            "#,
        )
        .bind(access_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Credential>> {
        let rows = sqlx::query_as::<Postgres, Credential>(
            r#"
            SELECT id, user_id, access_key, secret_key, bucket_name, is_active,
                created_at, updated_at
            FROM credentials
            WHERE user_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_active(&self, user_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM credentials WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self))]
    async fn deactivate(&self, user_id: i64, credential_id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND is_active
            "#,
        )
        .bind(credential_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn bucket_exists(&self, bucket_name: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM credentials WHERE bucket_name = $1)")
                .bind(bucket_name)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}
