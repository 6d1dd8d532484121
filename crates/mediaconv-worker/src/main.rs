use std::sync::Arc;

use anyhow::Context;
use mediaconv_core::Config;
use mediaconv_processing::ProcessRunner;
use mediaconv_services::ServiceContext;
use mediaconv_worker::{JobProcessor, JobWorker};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    config.validate().context("Configuration validation failed")?;

    mediaconv_infra::init_telemetry("mediaconv-worker")
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let ctx = ServiceContext::connect(config).await?;
    let processor = Arc::new(JobProcessor::new(&ctx, Arc::new(ProcessRunner)));
    let worker = JobWorker::start(processor, ctx.notifier.clone())
        .await
        .context("Failed to subscribe to job notifications")?;

    tracing::info!(
        work_dir = ?ctx.config.work_dir(),
        ffmpeg_path = %ctx.config.tool_paths().ffmpeg,
        convert_path = %ctx.config.tool_paths().convert,
        pdftotext_path = %ctx.config.tool_paths().pdftotext,
        "Worker ready and waiting for jobs"
    );

    mediaconv_infra::shutdown_signal().await;
    worker.shutdown().await;
    Ok(())
}
