//! Job executor
//!
//! Runs a compiled pipeline one step at a time. The first failing step aborts
//! the job; there is no retry and no timeout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use mediaconv_core::{AppError, AppResult, PipelineDefinition, ToolPaths};

use crate::command::CommandRunner;
use crate::operations::{map_step, substitute, ExecutionContext};

/// Name of the directory `${output}` points at, inside the work directory.
pub const OUTPUT_DIR: &str = "output";

/// Creates a scratch directory for one job, under `parent` when given.
/// Dropping the returned guard removes the directory and everything in it.
pub fn scratch_dir(parent: Option<&Path>, job_id: i64) -> std::io::Result<TempDir> {
    let prefix = format!("mediaconv-job-{}-", job_id);
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix);
    match parent {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    }
}

#[derive(Clone)]
pub struct JobExecutor {
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
}

impl JobExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, tools: ToolPaths) -> Self {
        Self { runner, tools }
    }

    /// Executes every step against `input_file`, returning the substituted
    /// output path of each step in order.
    #[tracing::instrument(skip(self, pipeline, input_file, work_dir), fields(pipeline = %pipeline.name))]
    pub async fn execute(
        &self,
        pipeline: &PipelineDefinition,
        input_file: &Path,
        work_dir: &Path,
    ) -> AppResult<Vec<PathBuf>> {
        let compiled = pipeline.compile()?;

        let output_dir = work_dir.join(OUTPUT_DIR);
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            AppError::Internal(format!("failed to create output directory: {}", e))
        })?;

        let ctx = ExecutionContext {
            input_file: input_file.to_string_lossy().to_string(),
            output_dir: output_dir.to_string_lossy().to_string(),
        };

        let mut outputs = Vec::with_capacity(pipeline.steps.len());
        for (index, (step, params)) in pipeline.steps.iter().zip(compiled.iter()).enumerate() {
            let number = index + 1;
            let invocation = map_step(step, params, &ctx);
            let program = invocation.tool.program(&self.tools);

            tracing::info!(
                step = number,
                operation = %step.operation,
                tool = %invocation.tool,
                args = ?invocation.args,
                "Executing step"
            );

            let start = std::time::Instant::now();
            let result = self
                .runner
                .run(program, &invocation.args)
                .await
                .map_err(|e| AppError::Execution {
                    message: format!("step {}: failed to run {}: {}", number, invocation.tool, e),
                    output: String::new(),
                })?;

            if !result.success {
                let status = result
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                tracing::warn!(
                    step = number,
                    tool = %invocation.tool,
                    exit_status = %status,
                    "Step failed"
                );
                return Err(AppError::Execution {
                    message: format!(
                        "step {}: {} exited with status {}",
                        number, invocation.tool, status
                    ),
                    output: result.output,
                });
            }

            let output_path = PathBuf::from(substitute(&step.output, &ctx));
            tracing::info!(
                step = number,
                output = %output_path.display(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Step completed"
            );
            outputs.push(output_path);
        }

        Ok(outputs)
    }
}
