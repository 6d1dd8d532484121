use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of active credentials a single user may hold.
pub const MAX_ACTIVE_CREDENTIALS: usize = 5;

/// An S3 access credential bound to exactly one bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Credential {
    pub id: i64,
    pub user_id: i64,
    pub access_key: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub bucket_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to persist a freshly generated credential.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub user_id: i64,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
}
