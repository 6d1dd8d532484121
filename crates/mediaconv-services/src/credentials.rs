//! Gateway credential issuing.

use std::sync::Arc;

use serde::Serialize;

use mediaconv_core::credentials::{generate_access_key, generate_bucket_name, generate_secret_key};
use mediaconv_core::models::{Credential, NewCredential, MAX_ACTIVE_CREDENTIALS};
use mediaconv_core::validation::{is_valid_bucket_name, validate_bucket_name, BUCKET_NAME_RULES};
use mediaconv_core::{AppError, AppResult};
use mediaconv_db::CredentialRepository;

/// A freshly issued credential. The secret is only ever shown here.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCredential {
    pub credential: Credential,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketAvailability {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct CredentialService {
    repo: Arc<dyn CredentialRepository>,
}

impl CredentialService {
    pub fn new(repo: Arc<dyn CredentialRepository>) -> Self {
        Self { repo }
    }

    /// Issues a new key pair bound to `bucket_name`, or to a generated
    /// `user-{id}-xxxxxxxx` bucket when none is given.
    #[tracing::instrument(skip(self))]
    pub async fn create(
        &self,
        user_id: i64,
        bucket_name: Option<&str>,
    ) -> AppResult<IssuedCredential> {
        let active = self.repo.count_active(user_id).await?;
        if active >= MAX_ACTIVE_CREDENTIALS as i64 {
            return Err(AppError::Validation(format!(
                "Maximum number of active credentials reached ({})",
                MAX_ACTIVE_CREDENTIALS
            )));
        }

        let bucket_name = match bucket_name {
            Some(name) => {
                validate_bucket_name(name)?;
                if self.repo.bucket_exists(name).await? {
                    return Err(AppError::Conflict("Bucket name already taken".to_string()));
                }
                name.to_string()
            }
            None => generate_bucket_name(user_id),
        };

        let secret_key = generate_secret_key();
        let credential = self
            .repo
            .create(NewCredential {
                user_id,
                access_key: generate_access_key(),
                secret_key: secret_key.clone(),
                bucket_name,
            })
            .await?;

        Ok(IssuedCredential {
            credential,
            secret_key,
        })
    }

    pub async fn list(&self, user_id: i64) -> AppResult<Vec<Credential>> {
        self.repo.list_for_user(user_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn revoke(&self, user_id: i64, credential_id: i64) -> AppResult<()> {
        if self.repo.deactivate(user_id, credential_id).await? {
            tracing::info!(credential_id = credential_id, "Credential revoked");
            Ok(())
        } else {
            Err(AppError::NotFound("Credential not found".to_string()))
        }
    }

    pub async fn check_bucket(&self, name: &str) -> AppResult<BucketAvailability> {
        let (available, reason) = if !is_valid_bucket_name(name) {
            (
                false,
                Some(format!("Invalid bucket name format. {}", BUCKET_NAME_RULES)),
            )
        } else if self.repo.bucket_exists(name).await? {
            (false, Some("Bucket name already taken".to_string()))
        } else {
            (true, None)
        };
        Ok(BucketAvailability {
            name: name.to_string(),
            available,
            reason,
        })
    }

    /// Active credential for an access key.
    pub async fn find_active(&self, access_key: &str) -> AppResult<Option<Credential>> {
        self.repo.find_active_by_access_key(access_key).await
    }
}
