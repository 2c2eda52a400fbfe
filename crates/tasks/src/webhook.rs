//! Background webhook delivery: a bounded channel drained by a single worker
//! that retries each delivery with capped exponential backoff, grounded in
//! the classifier's provider-retry backoff shape (100ms start, doubling, capped).

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

/// One webhook POST to deliver: the destination URL and the JSON body.
#[derive(Debug, Clone)]
pub struct WebhookJob {
    pub url: String,
    pub body: serde_json::Value,
}

/// Abstracts "POST this JSON somewhere and tell me if it was accepted" so the
/// retry loop can be exercised without a real HTTP server.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, url: &str, body: &serde_json::Value) -> Result<(), String>;
}

pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookSender for ReqwestSender {
    async fn send(&self, url: &str, body: &serde_json::Value) -> Result<(), String> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("webhook endpoint returned {}", response.status()))
        }
    }
}

/// Spawns the worker and hands back a handle for enqueuing deliveries.
pub struct WebhookDelivery {
    tx: mpsc::Sender<WebhookJob>,
}

impl WebhookDelivery {
    pub fn spawn(sender: impl WebhookSender + 'static, max_attempts: u32) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run_worker(sender, rx, max_attempts.max(1)));
        Self { tx }
    }

    /// Best-effort enqueue; a full or closed channel just drops the job, since
    /// webhook delivery is at-least-once on a best-effort basis, not guaranteed.
    pub async fn enqueue(&self, job: WebhookJob) {
        if self.tx.try_send(job).is_err() {
            warn!("webhook delivery queue full or closed, dropping delivery");
        }
    }
}

async fn run_worker(sender: impl WebhookSender, mut rx: mpsc::Receiver<WebhookJob>, max_attempts: u32) {
    while let Some(job) = rx.recv().await {
        deliver_with_retry(&sender, &job, max_attempts).await;
    }
}

async fn deliver_with_retry(sender: &(impl WebhookSender + ?Sized), job: &WebhookJob, max_attempts: u32) {
    let mut backoff = Duration::from_millis(200);
    for attempt in 1..=max_attempts {
        match sender.send(&job.url, &job.body).await {
            Ok(()) => return,
            Err(reason) => {
                warn!(url = %job.url, attempt, %reason, "webhook delivery attempt failed");
                if attempt < max_attempts {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                }
            }
        }
    }
    warn!(url = %job.url, max_attempts, "webhook delivery exhausted retries");
}
