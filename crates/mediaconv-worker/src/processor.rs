//! Processing of a single announced job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use mediaconv_core::models::{File, Job, JobStatus};
use mediaconv_core::{AppError, AppResult, PipelineDefinition};
use mediaconv_db::{FileRepository, PipelineRepository};
use mediaconv_processing::{scratch_dir, CommandRunner, JobExecutor};
use mediaconv_services::{JobAnalytics, JobDispatcher, JobMetric, ServiceContext};
use mediaconv_storage::{content_type_for, keys, Storage};

pub const NO_PIPELINE_SPECIFIED: &str = "no pipeline specified";

pub struct JobProcessor {
    dispatcher: JobDispatcher,
    files: Arc<dyn FileRepository>,
    pipelines: Arc<dyn PipelineRepository>,
    storage: Arc<dyn Storage>,
    executor: JobExecutor,
    analytics: Arc<dyn JobAnalytics>,
    work_dir: Option<PathBuf>,
}

impl JobProcessor {
    pub fn new(ctx: &ServiceContext, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            dispatcher: ctx.dispatcher(),
            files: ctx.repos.files.clone(),
            pipelines: ctx.repos.pipelines.clone(),
            storage: ctx.storage.clone(),
            executor: JobExecutor::new(runner, ctx.config.tool_paths().clone()),
            analytics: ctx.analytics.clone(),
            work_dir: ctx.config.work_dir().cloned(),
        }
    }

    /// Runs job `job_id` to a terminal state. Returns `None` when the job was
    /// skipped because it is no longer pending.
    ///
    /// A failure inside the pipeline marks the job failed and is not an
    /// error here; `Err` means the job could not be loaded or moved.
    #[tracing::instrument(skip(self))]
    pub async fn process(&self, job_id: i64) -> AppResult<Option<Job>> {
        let job = self.dispatcher.get(job_id).await?;
        if job.status != JobStatus::Pending {
            tracing::info!(
                job_id = job.id,
                status = %job.status,
                "Skipping job that is not pending"
            );
            return Ok(None);
        }

        let start = Instant::now();
        let job = self.dispatcher.start_processing(&job).await?;

        let finished = match self.run(&job).await {
            Ok(output_keys) => {
                let output_count = output_keys.len();
                let finished = self.dispatcher.complete(&job, output_keys).await?;
                self.metric(job.id, "output_count", output_count as f64).await;
                tracing::info!(
                    job_id = job.id,
                    output_count = output_count,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Job completed"
                );
                finished
            }
            Err(message) => {
                tracing::error!(job_id = job.id, error = %message, "Job failed");
                self.dispatcher.fail(&job, &message).await?
            }
        };

        self.metric(job.id, "duration_ms", start.elapsed().as_secs_f64() * 1000.0)
            .await;
        Ok(Some(finished))
    }

    async fn run(&self, job: &Job) -> Result<Vec<String>, String> {
        let file = self
            .files
            .get(job.file_id)
            .await
            .map_err(|e| format!("failed to load file: {}", e))?
            .ok_or_else(|| format!("file {} not found", job.file_id))?;

        // Removed with everything in it when this guard drops.
        let scratch = scratch_dir(self.work_dir.as_deref(), job.id)
            .map_err(|e| format!("failed to create work directory: {}", e))?;

        let input = scratch.path().join(format!("input{}", file.extension()));
        let input_bytes = self
            .storage
            .download_to_file(&file.storage_key, &input)
            .await
            .map_err(|e| format!("failed to download file: {}", e))?;
        self.metric(job.id, "input_bytes", input_bytes as f64).await;

        let pipeline = self.resolve_pipeline(job).await?;

        let outputs = self
            .executor
            .execute(&pipeline, &input, scratch.path())
            .await
            .map_err(|e| format!("pipeline execution failed: {}", execution_detail(e)))?;

        self.upload_outputs(&file, job.id, &outputs)
            .await
            .map_err(|e| format!("failed to upload results: {}", e))
    }

    /// The saved pipeline when the job references one, otherwise the inline
    /// snapshot.
    async fn resolve_pipeline(&self, job: &Job) -> Result<PipelineDefinition, String> {
        if let Some(pipeline_id) = job.pipeline_id {
            let record = self
                .pipelines
                .get(pipeline_id)
                .await
                .map_err(|e| format!("failed to load pipeline: {}", e))?
                .ok_or_else(|| format!("pipeline {} not found", pipeline_id))?;
            return PipelineDefinition::parse(record.content.as_bytes(), record.format)
                .map_err(|e| format!("failed to parse pipeline: {}", e));
        }

        match &job.pipeline_snapshot {
            Some(snapshot) => PipelineDefinition::from_value(snapshot.clone())
                .map_err(|e| format!("failed to parse pipeline: {}", e)),
            None => Err(NO_PIPELINE_SPECIFIED.to_string()),
        }
    }

    async fn upload_outputs(
        &self,
        file: &File,
        job_id: i64,
        outputs: &[PathBuf],
    ) -> AppResult<Vec<String>> {
        let mut uploaded = Vec::with_capacity(outputs.len());
        for path in outputs {
            let name = file_name(path)?;
            let key = keys::job_output_key(file.user_id, job_id, name);
            self.storage
                .upload_file(&key, path, content_type_for(name))
                .await?;
            tracing::debug!(job_id = job_id, key = %key, "Uploaded job output");
            uploaded.push(key);
        }
        Ok(uploaded)
    }

    async fn metric(&self, job_id: i64, name: &'static str, value: f64) {
        self.analytics
            .record_job_metric(&JobMetric::new(job_id, name, value))
            .await;
    }
}

fn file_name(path: &Path) -> AppResult<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Internal(format!("invalid output path: {}", path.display())))
}

/// Execution errors carry the tool output; keep it in the job's error text.
fn execution_detail(err: AppError) -> String {
    match err {
        AppError::Execution { message, output } if !output.trim().is_empty() => {
            format!("{}: {}", message, output.trim())
        }
        AppError::Execution { message, .. } => message,
        other => other.to_string(),
    }
}
