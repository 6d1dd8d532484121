//! Configuration module
//!
//! Environment-driven configuration for the gateway, the worker and the
//! operator CLI. Values are read once at startup (after loading `.env`) and
//! passed around explicitly inside the service context.

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_SIZE_MB: usize = 512;
const DEFAULT_REGION: &str = "us-east-1";

/// Program paths for the external media tools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: String,
    pub convert: String,
    pub pdftotext: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            convert: "convert".to_string(),
            pdftotext: "pdftotext".to_string(),
        }
    }
}

/// Full service configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub server_port: u16,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Backing object store
    pub storage_backend: StorageBackend,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>, // MinIO and other S3-compatible providers
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub local_storage_path: Option<String>,
    // Gateway
    pub gateway_public_endpoint: String,
    pub gateway_virtual_host_domain: Option<String>,
    pub gateway_region: String,
    pub max_upload_size_bytes: usize,
    // Worker
    pub analytics_enabled: bool,
    pub work_dir: Option<PathBuf>,
    pub tool_paths: ToolPaths,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

impl Config {
    fn as_service(&self) -> &ServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_service().environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_service().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_service().server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_service().environment
    }

    pub fn database_url(&self) -> &str {
        &self.as_service().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_service().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_service().db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_service().storage_backend
    }

    pub fn s3_bucket(&self) -> &str {
        &self.as_service().s3_bucket
    }

    pub fn s3_region(&self) -> &str {
        &self.as_service().s3_region
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_service().s3_endpoint.as_deref()
    }

    pub fn s3_access_key(&self) -> Option<&str> {
        self.as_service().s3_access_key.as_deref()
    }

    pub fn s3_secret_key(&self) -> Option<&str> {
        self.as_service().s3_secret_key.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_service().local_storage_path.as_deref()
    }

    pub fn gateway_public_endpoint(&self) -> &str {
        &self.as_service().gateway_public_endpoint
    }

    pub fn gateway_virtual_host_domain(&self) -> Option<&str> {
        self.as_service().gateway_virtual_host_domain.as_deref()
    }

    pub fn gateway_region(&self) -> &str {
        &self.as_service().gateway_region
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_service().max_upload_size_bytes
    }

    pub fn analytics_enabled(&self) -> bool {
        self.as_service().analytics_enabled
    }

    pub fn work_dir(&self) -> Option<&PathBuf> {
        self.as_service().work_dir.as_ref()
    }

    pub fn tool_paths(&self) -> &ToolPaths {
        &self.as_service().tool_paths
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse::<u16>()
            .unwrap_or(SERVER_PORT);

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let defaults = ToolPaths::default();
        let tool_paths = ToolPaths {
            ffmpeg: env_opt("FFMPEG_PATH").unwrap_or(defaults.ffmpeg),
            convert: env_opt("CONVERT_PATH").unwrap_or(defaults.convert),
            pdftotext: env_opt("PDFTOTEXT_PATH").unwrap_or(defaults.pdftotext),
        };

        Ok(ServiceConfig {
            server_port,
            environment,
            database_url,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "media".to_string()),
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            s3_access_key: env_opt("S3_ACCESS_KEY"),
            s3_secret_key: env_opt("S3_SECRET_KEY"),
            local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            gateway_public_endpoint: env_opt("GATEWAY_PUBLIC_ENDPOINT")
                .unwrap_or_else(|| format!("http://localhost:{}", server_port)),
            gateway_virtual_host_domain: env_opt("GATEWAY_VIRTUAL_HOST_DOMAIN"),
            gateway_region: env::var("GATEWAY_REGION")
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            analytics_enabled: env_flag("ANALYTICS_ENABLED"),
            work_dir: env_opt("WORK_DIR").map(PathBuf::from),
            tool_paths,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_access_key.is_some() != self.s3_secret_key.is_some() {
                    return Err(anyhow::anyhow!(
                        "S3_ACCESS_KEY and S3_SECRET_KEY must be set together"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        if !self.gateway_public_endpoint.starts_with("http://")
            && !self.gateway_public_endpoint.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "GATEWAY_PUBLIC_ENDPOINT must be an http(s) URL"
            ));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        Ok(())
    }
}
