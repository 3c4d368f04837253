use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::JobStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address of the document-generation pipeline webhook.
    #[serde(default)]
    pub pipeline_url: Option<String>,
    /// Publicly reachable base address of this service, used to build the
    /// callback URL handed to the pipeline.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_forward_timeout_secs")]
    pub forward_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Status assumed when a callback arrives without one.
    #[serde(default = "default_callback_status")]
    pub callback_default_status: JobStatus,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_forward_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_callback_status() -> JobStatus {
    JobStatus::Completed
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            pipeline_url: None,
            public_base_url: None,
            forward_timeout_secs: default_forward_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            callback_default_status: default_callback_status(),
            log_file: None,
        }
    }
}

impl RelayConfig {
    /// Apply `N8N_WEBHOOK_URL` / `PUBLIC_BASE_URL` from the environment.
    /// Empty values are ignored.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("N8N_WEBHOOK_URL").ok(),
            std::env::var("PUBLIC_BASE_URL").ok(),
        );
    }

    /// Pipeline webhook address, or `None` when unset or blank.
    pub fn pipeline_endpoint(&self) -> Option<&str> {
        non_blank(self.pipeline_url.as_deref())
    }

    /// Public base address, or `None` when unset or blank.
    pub fn public_base(&self) -> Option<&str> {
        non_blank(self.public_base_url.as_deref())
    }

    /// Poll interval for client commands; never zero.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn apply_overrides(&mut self, pipeline_url: Option<String>, public_base_url: Option<String>) {
        if let Some(url) = pipeline_url.filter(|u| !u.trim().is_empty()) {
            self.pipeline_url = Some(url);
        }
        if let Some(url) = public_base_url.filter(|u| !u.trim().is_empty()) {
            self.public_base_url = Some(url);
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
