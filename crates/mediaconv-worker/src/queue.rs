//! Job consumption loop: subscribe to job notifications and process one job
//! at a time.
//!
//! Shutdown: [`JobWorker::shutdown`] stops the loop after the job in flight
//! finishes. A step that is already running is never interrupted.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mediaconv_core::AppResult;
use mediaconv_db::JobNotifier;

use crate::processor::JobProcessor;

pub struct JobWorker {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl JobWorker {
    /// Subscribes before returning, so every id published afterwards is
    /// seen by this worker.
    pub async fn start(
        processor: Arc<JobProcessor>,
        notifier: Arc<dyn JobNotifier>,
    ) -> AppResult<Self> {
        let mut subscription = notifier.subscribe().await?;
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            tracing::info!("Job worker started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Job worker shutting down");
                        break;
                    }
                    next = subscription.next() => match next {
                        Some(job_id) => Self::handle_job(&processor, job_id).await,
                        None => {
                            tracing::warn!("Job subscription closed");
                            break;
                        }
                    }
                }
            }
            tracing::info!("Job worker stopped");
        });

        Ok(Self {
            shutdown_tx,
            handle,
        })
    }

    async fn handle_job(processor: &JobProcessor, job_id: i64) {
        match processor.process(job_id).await {
            Ok(Some(job)) => {
                tracing::debug!(job_id = job.id, status = %job.status, "Job finished")
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, job_id = job_id, "Failed to process job"),
        }
    }

    /// Signals the loop to stop and waits for it.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Job worker task panicked");
        }
    }

    /// Waits until the loop ends on its own, e.g. when the subscription
    /// closes.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Job worker task panicked");
        }
    }
}
