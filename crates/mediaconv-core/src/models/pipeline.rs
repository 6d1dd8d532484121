use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Serialization format of a saved pipeline definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "pipeline_format", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PipelineFormat {
    Yaml,
    Json,
}

impl Display for PipelineFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PipelineFormat::Yaml => write!(f, "yaml"),
            PipelineFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for PipelineFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(PipelineFormat::Yaml),
            "json" => Ok(PipelineFormat::Json),
            _ => Err(AppError::Validation(format!(
                "unsupported pipeline format: {}",
                s
            ))),
        }
    }
}

/// A pipeline definition saved by a user, stored in its raw form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PipelineRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub format: PipelineFormat,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPipeline {
    pub user_id: i64,
    pub name: String,
    pub format: PipelineFormat,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("yaml".parse::<PipelineFormat>().unwrap(), PipelineFormat::Yaml);
        assert_eq!("YML".parse::<PipelineFormat>().unwrap(), PipelineFormat::Yaml);
        assert_eq!("json".parse::<PipelineFormat>().unwrap(), PipelineFormat::Json);
        assert!(matches!(
            "toml".parse::<PipelineFormat>(),
            Err(AppError::Validation(_))
        ));
    }
}
