use std::sync::Arc;

use anyhow::{Context, Result};
use mediaconv_core::Config;
use mediaconv_db::{setup_database, JobNotifier, PgJobNotifier, Repositories};
use mediaconv_storage::{create_storage, Storage};

use crate::analytics::{analytics_from_config, JobAnalytics};
use crate::credentials::CredentialService;
use crate::dispatcher::JobDispatcher;
use crate::pipelines::PipelineService;

/// Everything a component needs, wired once at startup and passed down
/// explicitly.
#[derive(Clone)]
pub struct ServiceContext {
    pub config: Config,
    pub repos: Repositories,
    pub storage: Arc<dyn Storage>,
    pub notifier: Arc<dyn JobNotifier>,
    pub analytics: Arc<dyn JobAnalytics>,
}

impl ServiceContext {
    pub fn new(
        config: Config,
        repos: Repositories,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn JobNotifier>,
        analytics: Arc<dyn JobAnalytics>,
    ) -> Self {
        Self {
            config,
            repos,
            storage,
            notifier,
            analytics,
        }
    }

    /// Production wiring: Postgres catalog and notifications, storage from
    /// `STORAGE_BACKEND`, analytics from `ANALYTICS_ENABLED`.
    pub async fn connect(config: Config) -> Result<Self> {
        let pool = setup_database(&config).await?;
        let storage = create_storage(&config)
            .await
            .context("Failed to initialize storage")?;
        tracing::info!(backend = %storage.backend_type(), "Storage initialized");

        let analytics = analytics_from_config(config.analytics_enabled());
        Ok(Self::new(
            config,
            Repositories::postgres(pool.clone()),
            storage,
            Arc::new(PgJobNotifier::new(pool)),
            analytics,
        ))
    }

    pub fn dispatcher(&self) -> JobDispatcher {
        JobDispatcher::new(
            self.repos.jobs.clone(),
            self.repos.files.clone(),
            self.notifier.clone(),
            self.analytics.clone(),
        )
    }

    pub fn credentials(&self) -> CredentialService {
        CredentialService::new(self.repos.credentials.clone())
    }

    pub fn pipelines(&self) -> PipelineService {
        PipelineService::new(self.repos.pipelines.clone())
    }
}
