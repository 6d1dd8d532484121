//! In-memory catalog
//!
//! Implements every repository trait over maps behind a single
//! `tokio::sync::Mutex`, with the same uniqueness and transition rules as the
//! Postgres schema. Used by tests and by local runs without a database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use mediaconv_core::models::{
    Actor, Credential, File, Job, JobStatus, JobStatusHistory, NewCredential, NewFile, NewJob,
    NewPipeline, PipelineRecord,
};
use mediaconv_core::{AppError, AppResult};

use super::credential::CredentialRepository;
use super::file::FileRepository;
use super::job::{JobRepository, JobTransition};
use super::pipeline::PipelineRepository;

#[derive(Default)]
struct CatalogState {
    next_id: i64,
    credentials: HashMap<i64, Credential>,
    files: HashMap<i64, (File, bool)>,
    pipelines: HashMap<i64, PipelineRecord>,
    jobs: HashMap<i64, Job>,
    history: Vec<JobStatusHistory>,
}

impl CatalogState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of job rows, for assertions in tests.
    pub async fn job_count(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    /// Number of live file rows, for assertions in tests.
    pub async fn file_count(&self) -> usize {
        self.state
            .lock()
            .await
            .files
            .values()
            .filter(|(_, live)| *live)
            .count()
    }

    /// All jobs ordered by id.
    pub async fn jobs(&self) -> Vec<Job> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCatalog {
    async fn create(&self, credential: NewCredential) -> AppResult<Credential> {
        let mut state = self.state.lock().await;
        if state
            .credentials
            .values()
            .any(|c| c.bucket_name == credential.bucket_name)
        {
            return Err(AppError::Conflict(format!(
                "bucket name already taken: {}",
                credential.bucket_name
            )));
        }
        if state
            .credentials
            .values()
            .any(|c| c.access_key == credential.access_key)
        {
            return Err(AppError::Conflict("access key already exists".to_string()));
        }

        let now = Utc::now();
        let id = state.next_id();
        let created = Credential {
            id,
            user_id: credential.user_id,
            access_key: credential.access_key,
            secret_key: credential.secret_key,
            bucket_name: credential.bucket_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.credentials.insert(id, created.clone());
        Ok(created)
    }

    async fn find_active_by_access_key(&self, access_key: &str) -> AppResult<Option<Credential>> {
        let state = self.state.lock().await;
        Ok(state
            .credentials
            .values()
            .find(|c| c.is_active && c.access_key == access_key)
            .cloned())
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Credential>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Credential> = state
            .credentials
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }

    async fn count_active(&self, user_id: i64) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .credentials
            .values()
            .filter(|c| c.user_id == user_id && c.is_active)
            .count() as i64)
    }

    async fn deactivate(&self, user_id: i64, credential_id: i64) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.credentials.get_mut(&credential_id) {
            Some(c) if c.user_id == user_id && c.is_active => {
                c.is_active = false;
                c.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn bucket_exists(&self, bucket_name: &str) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .credentials
            .values()
            .any(|c| c.bucket_name == bucket_name))
    }
}

#[async_trait]
impl FileRepository for InMemoryCatalog {
    async fn upsert(&self, file: NewFile) -> AppResult<File> {
        let mut state = self.state.lock().await;
        let existing = state
            .files
            .values_mut()
            .find(|(f, _)| f.storage_key == file.storage_key);

        if let Some((row, live)) = existing {
            row.original_name = file.original_name;
            row.size = file.size;
            row.content_type = file.content_type;
            *live = true;
            return Ok(row.clone());
        }

        let id = state.next_id();
        let row = File {
            id,
            user_id: file.user_id,
            original_name: file.original_name,
            storage_key: file.storage_key,
            size: file.size,
            content_type: file.content_type,
            created_at: Utc::now(),
        };
        state.files.insert(id, (row.clone(), true));
        Ok(row)
    }

    async fn get(&self, id: i64) -> AppResult<Option<File>> {
        let state = self.state.lock().await;
        Ok(state.files.get(&id).map(|(f, _)| f.clone()))
    }

    async fn find_by_key(&self, storage_key: &str) -> AppResult<Option<File>> {
        let state = self.state.lock().await;
        Ok(state
            .files
            .values()
            .find(|(f, live)| *live && f.storage_key == storage_key)
            .map(|(f, _)| f.clone()))
    }

    async fn delete_by_key(&self, user_id: i64, storage_key: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .files
            .values_mut()
            .find(|(f, live)| *live && f.user_id == user_id && f.storage_key == storage_key)
        {
            Some((_, live)) => {
                *live = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PipelineRepository for InMemoryCatalog {
    async fn create(&self, pipeline: NewPipeline) -> AppResult<PipelineRecord> {
        let mut state = self.state.lock().await;
        if state
            .pipelines
            .values()
            .any(|p| p.user_id == pipeline.user_id && p.name == pipeline.name)
        {
            return Err(AppError::Conflict(format!(
                "pipeline already exists: {}",
                pipeline.name
            )));
        }

        let id = state.next_id();
        let row = PipelineRecord {
            id,
            user_id: pipeline.user_id,
            name: pipeline.name,
            format: pipeline.format,
            content: pipeline.content,
            created_at: Utc::now(),
        };
        state.pipelines.insert(id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: i64) -> AppResult<Option<PipelineRecord>> {
        let state = self.state.lock().await;
        Ok(state.pipelines.get(&id).cloned())
    }

    async fn find_by_name(&self, user_id: i64, name: &str) -> AppResult<Option<PipelineRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .pipelines
            .values()
            .find(|p| p.user_id == user_id && p.name == name)
            .cloned())
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<PipelineRecord>> {
        let state = self.state.lock().await;
        let mut rows: Vec<PipelineRecord> = state
            .pipelines
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }
}

#[async_trait]
impl JobRepository for InMemoryCatalog {
    async fn create(&self, job: NewJob, actor: Actor, message: &str) -> AppResult<Job> {
        let mut state = self.state.lock().await;
        if !state.files.contains_key(&job.file_id) {
            return Err(AppError::NotFound(format!("file {} not found", job.file_id)));
        }

        let now = Utc::now();
        let id = state.next_id();
        let created = Job {
            id,
            file_id: job.file_id,
            pipeline_id: job.pipeline_id,
            pipeline_snapshot: job.pipeline_snapshot,
            status: JobStatus::Pending,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        };
        state.jobs.insert(id, created.clone());

        let history_id = state.next_id();
        state.history.push(JobStatusHistory {
            id: history_id,
            job_id: id,
            from_status: None,
            to_status: JobStatus::Pending,
            message: message.to_string(),
            actor,
            created_at: now,
        });
        Ok(created)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Job>> {
        let state = self.state.lock().await;
        Ok(state.jobs.get(&id).cloned())
    }

    async fn transition(&self, job_id: i64, transition: JobTransition) -> AppResult<Option<Job>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let updated = match state.jobs.get_mut(&job_id) {
            Some(job) if job.status == transition.from => {
                job.status = transition.to;
                if let Some(error) = &transition.error {
                    job.error = Some(error.clone());
                }
                if let Some(result) = &transition.result {
                    job.result = Some(result.clone());
                }
                if transition.to.is_terminal() {
                    job.finished_at = Some(now);
                }
                job.updated_at = now;
                job.clone()
            }
            _ => return Ok(None),
        };

        let history_id = state.next_id();
        state.history.push(JobStatusHistory {
            id: history_id,
            job_id,
            from_status: Some(transition.from),
            to_status: transition.to,
            message: transition.message,
            actor: transition.actor,
            created_at: now,
        });
        Ok(Some(updated))
    }

    async fn history(&self, job_id: i64) -> AppResult<Vec<JobStatusHistory>> {
        let state = self.state.lock().await;
        Ok(state
            .history
            .iter()
            .filter(|h| h.job_id == job_id)
            .cloned()
            .collect())
    }
}
