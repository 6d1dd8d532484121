//! Job notifications
//!
//! A job is announced by publishing its id as a decimal string on the single
//! shared channel [`JOB_NOTIFY_CHANNEL`]. Delivery is broadcast: every
//! subscriber sees every id, and nothing arbitrates between workers.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use sqlx::PgPool;
use tokio::sync::{broadcast, mpsc, Mutex};

use mediaconv_core::AppResult;

pub const JOB_NOTIFY_CHANNEL: &str = "job_notifications";

/// Stream of announced job ids.
pub type JobSubscription = Pin<Box<dyn Stream<Item = i64> + Send>>;

#[async_trait]
pub trait JobNotifier: Send + Sync {
    async fn publish(&self, job_id: i64) -> AppResult<()>;

    async fn subscribe(&self) -> AppResult<JobSubscription>;
}

fn parse_payload(payload: &str) -> Option<i64> {
    match payload.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(payload = %payload, "Ignoring malformed job notification");
            None
        }
    }
}

/// PostgreSQL `NOTIFY`/`LISTEN` notifier.
#[derive(Clone)]
pub struct PgJobNotifier {
    pool: PgPool,
}

impl PgJobNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobNotifier for PgJobNotifier {
    async fn publish(&self, job_id: i64) -> AppResult<()> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(JOB_NOTIFY_CHANNEL)
            .bind(job_id.to_string())
            .execute(&self.pool)
            .await?;
        tracing::debug!(job_id = job_id, "Job notification published");
        Ok(())
    }

    /// Spawns a listener task that reconnects after connection loss. Ids
    /// announced while disconnected are not replayed.
    async fn subscribe(&self) -> AppResult<JobSubscription> {
        let (tx, rx) = mpsc::channel::<i64>(64);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            loop {
                match sqlx::postgres::PgListener::connect_with(&pool).await {
                    Ok(mut listener) => {
                        if let Err(e) = listener.listen(JOB_NOTIFY_CHANNEL).await {
                            tracing::warn!(error = %e, "LISTEN failed, will retry");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            continue;
                        }
                        tracing::info!(channel = JOB_NOTIFY_CHANNEL, "Listening for jobs");
                        loop {
                            match listener.recv().await {
                                Ok(notification) => {
                                    if let Some(id) = parse_payload(notification.payload()) {
                                        if tx.send(id).await.is_err() {
                                            // Subscriber dropped.
                                            return;
                                        }
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Listener connection lost, reconnecting");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "PgListener connect failed, will retry");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|id| (id, rx))
        });
        Ok(Box::pin(stream))
    }
}

/// In-process broadcast notifier for tests and single-process runs.
#[derive(Clone)]
pub struct InMemoryJobNotifier {
    sender: broadcast::Sender<String>,
    published: Arc<Mutex<Vec<i64>>>,
}

impl InMemoryJobNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            sender,
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every id published so far, in order.
    pub async fn published(&self) -> Vec<i64> {
        self.published.lock().await.clone()
    }
}

impl Default for InMemoryJobNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobNotifier for InMemoryJobNotifier {
    async fn publish(&self, job_id: i64) -> AppResult<()> {
        self.published.lock().await.push(job_id);
        // No subscribers is not an error, the same as NOTIFY with no listener.
        let _ = self.sender.send(job_id.to_string());
        Ok(())
    }

    async fn subscribe(&self) -> AppResult<JobSubscription> {
        let rx = self.sender.subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => {
                        if let Some(id) = parse_payload(&payload) {
                            return Some((id, rx));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Job subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
