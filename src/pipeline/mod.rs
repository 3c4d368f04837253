// Job submitter: relays form submissions to the document-generation pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;

use crate::errors::RelayError;
use crate::models::{PipelineRequest, RelayConfig, SubmitRequest};

/// Path of the callback endpoint, appended to the public base URL.
pub const CALLBACK_PATH: &str = "/api/webhook/callback";

/// Category used when neither the request nor its form data names one.
pub const DEFAULT_CATEGORY: &str = "doc";

/// Raw answer of the pipeline webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReply {
    pub status: u16,
    pub body: String,
}

impl PipelineReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound transport to the pipeline. Implementations must bound how long
/// a single call may take.
#[async_trait]
pub trait PipelineTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<PipelineReply, RelayError>;
}

pub struct HttpPipelineTransport {
    client: reqwest::Client,
}

impl HttpPipelineTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build pipeline HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PipelineTransport for HttpPipelineTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<PipelineReply, RelayError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::Upstream {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| RelayError::Upstream {
            status: Some(status),
            body: format!("failed to read response body: {}", e),
        })?;
        Ok(PipelineReply { status, body })
    }
}

/// Acknowledgement of a forwarded job.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReceipt {
    pub job_id: String,
    pub callback_url: String,
    pub pipeline_response: String,
}

#[derive(Serialize)]
struct PingBody {
    test: bool,
    message: &'static str,
    timestamp: chrono::DateTime<Utc>,
}

/// Forwards jobs to the pipeline and returns as soon as it acknowledges.
/// Completion is only ever learned through the callback.
pub struct JobSubmitter {
    config: Arc<RelayConfig>,
    transport: Arc<dyn PipelineTransport>,
}

impl JobSubmitter {
    pub fn new(config: Arc<RelayConfig>, transport: Arc<dyn PipelineTransport>) -> Self {
        Self { config, transport }
    }

    fn pipeline_url(&self) -> Result<&str, RelayError> {
        self.config
            .pipeline_endpoint()
            .ok_or_else(|| RelayError::Configuration("N8N_WEBHOOK_URL not configured".to_string()))
    }

    /// Callback address handed to the pipeline.
    pub fn callback_url(&self) -> Result<String, RelayError> {
        let base = self.config.public_base().ok_or_else(|| {
            RelayError::Configuration("PUBLIC_BASE_URL not configured".to_string())
        })?;
        Ok(format!("{}{}", base.trim_end_matches('/'), CALLBACK_PATH))
    }

    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, RelayError> {
        // Both addresses are checked before anything leaves the process.
        let pipeline_url = self.pipeline_url()?.to_string();
        let callback_url = self.callback_url()?;

        let job_id = match request.job_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate_job_id(&resolve_category(&request)),
        };

        let body = PipelineRequest {
            job_id: job_id.clone(),
            document_id: job_id.clone(),
            form_data: request.form_data,
            callback_url: callback_url.clone(),
            timestamp: Utc::now(),
        };

        tracing::info!("Forwarding job '{}' to pipeline", job_id);
        let reply = self
            .transport
            .post_json(&pipeline_url, &serde_json::to_value(&body)?)
            .await
            .inspect_err(|e| tracing::warn!("Forwarding job '{}' failed: {}", job_id, e))?;

        if !reply.is_success() {
            tracing::warn!(
                "Pipeline rejected job '{}' with status {}: {}",
                job_id,
                reply.status,
                reply.body
            );
            return Err(RelayError::Upstream {
                status: Some(reply.status),
                body: reply.body,
            });
        }

        tracing::debug!("Pipeline acknowledged job '{}': {}", job_id, reply.body);
        Ok(SubmitReceipt {
            job_id,
            callback_url,
            pipeline_response: reply.body,
        })
    }

    /// Send a test message to the pipeline and return its raw reply.
    pub async fn ping(&self) -> Result<String, RelayError> {
        let pipeline_url = self.pipeline_url()?.to_string();
        let body = PingBody {
            test: true,
            message: "Test webhook from BMN document relay",
            timestamp: Utc::now(),
        };

        let reply = self
            .transport
            .post_json(&pipeline_url, &serde_json::to_value(&body)?)
            .await?;
        if !reply.is_success() {
            return Err(RelayError::Upstream {
                status: Some(reply.status),
                body: reply.body,
            });
        }
        tracing::info!("Pipeline ping answered: {}", reply.body);
        Ok(reply.body)
    }
}

fn resolve_category(request: &SubmitRequest) -> String {
    request
        .category
        .as_deref()
        .or_else(|| request.form_data.get("jenisPengelolaan").and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string()
}

/// `{category}_{n}` with `n` drawn uniformly from 100000..=999999.
///
/// Ids are not guaranteed unique; two submissions in the same category
/// collide with probability 1/900000.
pub fn generate_job_id(category: &str) -> String {
    let n: u32 = rand::rng().random_range(100_000..=999_999);
    format!("{}_{}", category, n)
}
