use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog record of an uploaded object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct File {
    pub id: i64,
    pub user_id: i64,
    pub original_name: String,
    pub storage_key: String,
    pub size: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub user_id: i64,
    pub original_name: String,
    pub storage_key: String,
    pub size: i64,
    pub content_type: String,
}

impl File {
    /// Extension of the original file name including the leading dot, or an
    /// empty string when the name has none.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default()
    }
}
