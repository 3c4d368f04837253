// Client-side poller: watches outstanding jobs until they reach a terminal state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::daemon::reader::StatusReader;
use crate::models::{DocumentStatus, JobStatus};

// ---------------------------------------------------------------------------
// StatusSource trait + implementations
// ---------------------------------------------------------------------------

/// Where the poller reads job status from. Reads must be side-effect free.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, job_id: &str) -> Result<DocumentStatus>;
}

/// Reads status over HTTP from a running relay.
pub struct HttpStatusSource {
    client: reqwest::Client,
    base_url: String,
}

/// `{base}/api/documents/status/{job_id}`, with the id as one
/// percent-encoded path segment so `/`, `?` and `#` stay part of it.
pub fn status_url(base_url: &str, job_id: &str) -> Result<reqwest::Url> {
    if matches!(job_id, "" | "." | "..") {
        anyhow::bail!("Job id '{}' cannot be used in a status URL", job_id);
    }
    let mut url = reqwest::Url::parse(base_url)
        .with_context(|| format!("Invalid relay address '{}'", base_url))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Relay address '{}' cannot carry a path", base_url))?
        .pop_if_empty()
        .extend(["api", "documents", "status", job_id]);
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

impl HttpStatusSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build status HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, job_id: &str) -> Result<DocumentStatus> {
        let url = status_url(&self.base_url, job_id)?;
        let body: serde_json::Value = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Status request for '{}' failed", job_id))?
            .json()
            .await
            .with_context(|| format!("Malformed status response for '{}'", job_id))?;

        let envelope: StatusEnvelope = serde_json::from_value(body.clone())
            .with_context(|| format!("Malformed status response for '{}'", job_id))?;
        if !envelope.success {
            anyhow::bail!(
                "Status read for '{}' failed: {}",
                job_id,
                envelope.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        serde_json::from_value(body)
            .with_context(|| format!("Status response for '{}' carried no status", job_id))
    }
}

#[async_trait]
impl StatusSource for StatusReader {
    async fn fetch(&self, job_id: &str) -> Result<DocumentStatus> {
        Ok(self.read(job_id).await?)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Emitted once per job, when it is first seen in a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Completed(DocumentStatus),
    Failed(DocumentStatus),
}

impl Notification {
    pub fn status(&self) -> &DocumentStatus {
        match self {
            Notification::Completed(s) | Notification::Failed(s) => s,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.status().job_id
    }
}

// ---------------------------------------------------------------------------
// ClientPoller
// ---------------------------------------------------------------------------

/// Owning handle of a running poller. Dropping it stops the poll loop.
pub struct PollerHandle {
    track_tx: mpsc::UnboundedSender<String>,
    notify_rx: mpsc::UnboundedReceiver<Notification>,
    shutdown_tx: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Start watching `job_id`. Returns false once the poller has stopped.
    pub fn track(&self, job_id: impl Into<String>) -> bool {
        self.track_tx.send(job_id.into()).is_ok()
    }

    /// Next terminal-state notification, or `None` after shutdown.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        self.notify_rx.recv().await
    }

    /// Stop polling and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

/// Shortest accepted poll interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub struct ClientPoller {
    source: Arc<dyn StatusSource>,
    interval: Duration,
    jobs: HashMap<String, JobStatus>,
}

impl ClientPoller {
    /// Spawn the poll loop. Every `interval` it reads each `processing` job
    /// once; reads inside a tick run concurrently and in no particular order.
    /// A zero interval is raised to [`MIN_INTERVAL`].
    pub fn spawn(source: Arc<dyn StatusSource>, interval: Duration) -> PollerHandle {
        let (track_tx, track_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let poller = ClientPoller {
            source,
            interval: interval.max(MIN_INTERVAL),
            jobs: HashMap::new(),
        };
        let join = tokio::spawn(poller.run(track_rx, notify_tx, shutdown_rx));

        PollerHandle {
            track_tx,
            notify_rx,
            shutdown_tx,
            join: Some(join),
        }
    }

    async fn run(
        mut self,
        mut track_rx: mpsc::UnboundedReceiver<String>,
        notify_tx: mpsc::UnboundedSender<Notification>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                Some(job_id) = track_rx.recv() => {
                    tracing::debug!("Poller tracking '{}'", job_id);
                    self.jobs.entry(job_id).or_insert(JobStatus::Processing);
                }
                _ = ticker.tick() => {
                    // A slow read must not hold up shutdown.
                    tokio::select! {
                        _ = self.poll_once(&notify_tx) => {}
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }
        }
        tracing::debug!("Poller stopped with {} tracked jobs", self.jobs.len());
    }

    async fn poll_once(&mut self, notify_tx: &mpsc::UnboundedSender<Notification>) {
        let outstanding: Vec<String> = self
            .jobs
            .iter()
            .filter(|(_, status)| !status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        if outstanding.is_empty() {
            return;
        }

        let source = &self.source;
        let reads = outstanding.into_iter().map(|job_id| async move {
            let result = source.fetch(&job_id).await;
            (job_id, result)
        });

        for (job_id, result) in join_all(reads).await {
            let status = match result {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!("Polling '{}' failed: {:#}", job_id, e);
                    continue;
                }
            };

            let notification = match status.status {
                JobStatus::Processing => continue,
                JobStatus::Completed => Notification::Completed(status),
                JobStatus::Error => Notification::Failed(status),
            };
            self.jobs.insert(job_id.clone(), notification.status().status);
            tracing::info!("Job '{}' reached {}", job_id, notification.status().status);
            let _ = notify_tx.send(notification);
        }
    }
}
