use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base of the export-style link derived from an artifact id.
pub const ARTIFACT_LINK_BASE: &str = "https://docs.google.com/document/d";

/// Derive the download link for a generated document.
pub fn artifact_link(artifact_id: &str) -> String {
    format!("{}/{}/export?format=doc", ARTIFACT_LINK_BASE, artifact_id)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// `completed` and `error` are final; nothing moves a job out of them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job as held by the status registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub primary_artifact_id: Option<String>,
    pub secondary_artifact_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// A fresh record in the default `processing` state.
    pub fn new(job_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Processing,
            primary_artifact_id: None,
            secondary_artifact_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a partial update into this record. Does not touch timestamps.
    pub fn apply(&mut self, update: RecordUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(id) = update.primary_artifact_id {
            self.primary_artifact_id = id;
        }
        if let Some(id) = update.secondary_artifact_id {
            self.secondary_artifact_id = id;
        }
        if let Some(error) = update.error {
            self.error = error;
        }
    }

    pub fn primary_artifact_link(&self) -> Option<String> {
        self.primary_artifact_id.as_deref().map(artifact_link)
    }

    pub fn secondary_artifact_link(&self) -> Option<String> {
        self.secondary_artifact_id.as_deref().map(artifact_link)
    }
}

/// Partial update applied by `StatusStore::set`.
///
/// `None` leaves a field untouched; for nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub status: Option<JobStatus>,
    pub primary_artifact_id: Option<Option<String>>,
    pub secondary_artifact_id: Option<Option<String>>,
    pub error: Option<Option<String>>,
}

/// Read-side view of a record, with the artifact links derived from the ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatus {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_artifact_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_artifact_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DocumentStatus {
    /// Status for a job the registry has not heard about yet.
    pub fn pending(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Processing,
            primary_artifact_id: None,
            secondary_artifact_id: None,
            primary_artifact_link: None,
            secondary_artifact_link: None,
            error: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl From<&DocumentRecord> for DocumentStatus {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            status: record.status,
            primary_artifact_id: record.primary_artifact_id.clone(),
            secondary_artifact_id: record.secondary_artifact_id.clone(),
            primary_artifact_link: record.primary_artifact_link(),
            secondary_artifact_link: record.secondary_artifact_link(),
            error: record.error.clone(),
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

/// Inbound body of the submit endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default, alias = "documentId", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Discriminator used when an id has to be generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub form_data: serde_json::Value,
}

/// Body forwarded to the pipeline webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    pub job_id: String,
    /// Legacy field name read by existing pipeline workflows.
    pub document_id: String,
    pub form_data: serde_json::Value,
    pub callback_url: String,
    pub timestamp: DateTime<Utc>,
}

/// Inbound body of the callback endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(default, alias = "documentId")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default, alias = "mainDocumentId")]
    pub primary_artifact_id: Option<String>,
    #[serde(default, alias = "notaPengantarId")]
    pub secondary_artifact_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
