//! Test helpers: build the gateway router over in-memory collaborators.
//!
//! The catalog and job notifications are in-process, storage is a local
//! directory, so these tests need no database or object store.

pub mod signing;

use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use mediaconv_api::setup::routes;
use mediaconv_api::state::AppState;
use mediaconv_core::models::{File, NewFile};
use mediaconv_core::{AppError, AppResult, Config, ServiceConfig, StorageBackend, ToolPaths};
use mediaconv_db::{FileRepository, InMemoryCatalog, InMemoryJobNotifier, Repositories};
use mediaconv_services::{IssuedCredential, NoopAnalytics, ServiceContext};
use mediaconv_storage::LocalStorage;
use tempfile::TempDir;

pub const TEST_USER_ID: i64 = 3;
pub const TEST_HOST: &str = "localhost:8080";

pub struct TestApp {
    pub server: TestServer,
    pub ctx: ServiceContext,
    pub catalog: InMemoryCatalog,
    pub notifier: Arc<InMemoryJobNotifier>,
    pub issued: IssuedCredential,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn bucket(&self) -> &str {
        &self.issued.credential.bucket_name
    }

    pub fn access_key(&self) -> &str {
        &self.issued.credential.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.issued.secret_key
    }
}

pub fn create_test_config(storage_dir: &std::path::Path) -> Config {
    Config(Box::new(ServiceConfig {
        server_port: 8080,
        environment: "test".to_string(),
        database_url: "postgres://localhost/mediaconv".to_string(),
        db_max_connections: 1,
        db_timeout_seconds: 1,
        storage_backend: StorageBackend::Local,
        s3_bucket: "media".to_string(),
        s3_region: "us-east-1".to_string(),
        s3_endpoint: None,
        s3_access_key: None,
        s3_secret_key: None,
        local_storage_path: Some(storage_dir.display().to_string()),
        gateway_public_endpoint: format!("http://{}", TEST_HOST),
        gateway_virtual_host_domain: None,
        gateway_region: "us-east-1".to_string(),
        max_upload_size_bytes: 1024 * 1024,
        analytics_enabled: false,
        work_dir: None,
        tool_paths: ToolPaths::default(),
    }))
}

/// File catalog whose every call fails, as when the database is down.
pub struct UnavailableFileRepository;

fn catalog_down() -> AppError {
    AppError::Internal("catalog unavailable".to_string())
}

#[async_trait]
impl FileRepository for UnavailableFileRepository {
    async fn upsert(&self, _file: NewFile) -> AppResult<File> {
        Err(catalog_down())
    }

    async fn get(&self, _id: i64) -> AppResult<Option<File>> {
        Err(catalog_down())
    }

    async fn find_by_key(&self, _storage_key: &str) -> AppResult<Option<File>> {
        Err(catalog_down())
    }

    async fn delete_by_key(&self, _user_id: i64, _storage_key: &str) -> AppResult<bool> {
        Err(catalog_down())
    }
}

/// Gateway with one issued credential for [`TEST_USER_ID`].
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Like [`setup_test_app`], letting the test swap parts of the state
/// before the router is built.
pub async fn setup_test_app_with(customize: impl FnOnce(&mut AppState)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage = Arc::new(
        LocalStorage::new(temp_dir.path())
            .await
            .expect("Failed to create local storage"),
    );
    let catalog = InMemoryCatalog::new();
    let notifier = Arc::new(InMemoryJobNotifier::new());
    let config = create_test_config(temp_dir.path());

    let ctx = ServiceContext::new(
        config.clone(),
        Repositories::in_memory(catalog.clone()),
        storage,
        notifier.clone(),
        Arc::new(NoopAnalytics),
    );

    let issued = ctx
        .credentials()
        .create(TEST_USER_ID, None)
        .await
        .expect("Failed to issue credential");

    let mut state = AppState::new(ctx.clone());
    customize(&mut state);
    let app = routes::setup_routes(&config, state);
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        ctx,
        catalog,
        notifier,
        issued,
        _temp_dir: temp_dir,
    }
}
