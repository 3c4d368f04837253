use std::sync::Arc;

use chrono::Utc;

use crate::errors::RelayError;
use crate::models::{CallbackPayload, DocumentRecord, JobStatus, RecordUpdate};
use crate::storage::StatusStore;

/// Fixed artifact ids used by the simulated callback.
pub const MOCK_PRIMARY_ARTIFACT_ID: &str = "1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms";
pub const MOCK_SECONDARY_ARTIFACT_ID: &str = "1AbcDEfGhIjKlMnOpQrStUvWxYz1234567890AbCdEf";

/// Applies pipeline callbacks to the status registry.
///
/// Callers are not authenticated: anyone who can reach the endpoint can
/// report an outcome for any job id.
pub struct CallbackReceiver {
    store: Arc<dyn StatusStore>,
    default_status: JobStatus,
}

impl CallbackReceiver {
    pub fn new(store: Arc<dyn StatusStore>, default_status: JobStatus) -> Self {
        Self {
            store,
            default_status,
        }
    }

    /// Validate a callback and write it to the registry. Exactly one
    /// registry write happens on success and none on failure.
    pub async fn receive(&self, payload: CallbackPayload) -> Result<DocumentRecord, RelayError> {
        let job_id = payload
            .job_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| RelayError::Validation("jobId is required".to_string()))?;
        // Ids are used verbatim as registry keys and in status URLs.
        if job_id.trim() != job_id {
            return Err(RelayError::Validation(format!(
                "jobId '{}' has leading or trailing whitespace",
                job_id
            )));
        }
        if matches!(job_id.as_str(), "." | "..") {
            return Err(RelayError::Validation(format!("jobId '{}' is reserved", job_id)));
        }

        let primary = non_blank(payload.primary_artifact_id);
        let secondary = non_blank(payload.secondary_artifact_id);

        let status = match payload.status {
            Some(status) => status,
            None => {
                tracing::warn!(
                    "Callback for '{}' carried no status, assuming '{}'",
                    job_id,
                    self.default_status
                );
                self.default_status
            }
        };

        if status == JobStatus::Completed && primary.is_none() && secondary.is_none() {
            tracing::warn!("Rejected completed callback for '{}' without artifacts", job_id);
            return Err(RelayError::Validation(format!(
                "completed callback for '{}' must carry at least one artifact id",
                job_id
            )));
        }

        let update = RecordUpdate {
            status: Some(status),
            primary_artifact_id: Some(primary),
            secondary_artifact_id: Some(secondary),
            error: Some(non_blank(payload.error)),
        };

        let record = self.store.set(&job_id, update).await?;
        match record.status {
            JobStatus::Error => tracing::warn!(
                "Callback: job '{}' failed: {}",
                job_id,
                record.error.as_deref().unwrap_or("no error detail")
            ),
            status => tracing::info!(
                "Callback: job '{}' is {} (primary: {:?}, secondary: {:?})",
                job_id,
                status,
                record.primary_artifact_id,
                record.secondary_artifact_id
            ),
        }
        Ok(record)
    }

    /// Push a synthetic successful callback through [`receive`](Self::receive).
    pub async fn simulate(&self, job_id: Option<String>) -> Result<DocumentRecord, RelayError> {
        let job_id = non_blank(job_id)
            .unwrap_or_else(|| format!("doc_{}", Utc::now().timestamp_millis()));
        tracing::info!("Simulating pipeline callback for '{}'", job_id);

        self.receive(CallbackPayload {
            job_id: Some(job_id),
            status: Some(JobStatus::Completed),
            primary_artifact_id: Some(MOCK_PRIMARY_ARTIFACT_ID.to_string()),
            secondary_artifact_id: Some(MOCK_SECONDARY_ARTIFACT_ID.to_string()),
            error: None,
        })
        .await
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifact_link;
    use crate::storage::InMemoryStatusStore;

    fn receiver() -> (Arc<InMemoryStatusStore>, CallbackReceiver) {
        let store = Arc::new(InMemoryStatusStore::new());
        let receiver = CallbackReceiver::new(store.clone(), JobStatus::Completed);
        (store, receiver)
    }

    fn payload(job_id: &str) -> CallbackPayload {
        CallbackPayload {
            job_id: Some(job_id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_job_id_is_rejected_without_write() {
        let (store, receiver) = receiver();
        let err = receiver
            .receive(CallbackPayload {
                primary_artifact_id: Some("DOC".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_job_id_is_rejected() {
        let (store, receiver) = receiver();
        let err = receiver.receive(payload("   ")).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_padded_job_id_is_rejected_without_write() {
        let (store, receiver) = receiver();
        for id in [" psp_1", "psp_1 ", "\tpsp_1"] {
            let err = receiver
                .receive(CallbackPayload {
                    primary_artifact_id: Some("DOC".to_string()),
                    ..payload(id)
                })
                .await
                .unwrap_err();
            assert!(matches!(err, RelayError::Validation(_)));
        }
        assert!(store.get("psp_1").await.unwrap().is_none());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dot_segment_job_ids_are_rejected() {
        let (store, receiver) = receiver();
        for id in [".", ".."] {
            let err = receiver
                .receive(CallbackPayload {
                    status: Some(JobStatus::Error),
                    ..payload(id)
                })
                .await
                .unwrap_err();
            assert!(matches!(err, RelayError::Validation(_)));
        }
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_status_defaults_to_completed() {
        let (_store, receiver) = receiver();
        let record = receiver
            .receive(CallbackPayload {
                primary_artifact_id: Some("DOC123".to_string()),
                ..payload("psp_482913")
            })
            .await
            .unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(
            record.primary_artifact_link().as_deref(),
            Some("https://docs.google.com/document/d/DOC123/export?format=doc")
        );
        assert!(record.secondary_artifact_link().is_none());
    }

    #[tokio::test]
    async fn test_configured_default_status_is_used() {
        let store = Arc::new(InMemoryStatusStore::new());
        let receiver = CallbackReceiver::new(store, JobStatus::Error);
        let record = receiver.receive(payload("quiet")).await.unwrap();
        assert_eq!(record.status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_completed_without_artifacts_is_rejected() {
        let (store, receiver) = receiver();
        let err = receiver.receive(payload("empty")).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert!(store.get("empty").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_callback_records_message_without_links() {
        let (_store, receiver) = receiver();
        let record = receiver
            .receive(CallbackPayload {
                status: Some(JobStatus::Error),
                error: Some("pipeline timeout".to_string()),
                ..payload("x1")
            })
            .await
            .unwrap();
        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(record.error.as_deref(), Some("pipeline timeout"));
        assert!(record.primary_artifact_link().is_none());
        assert!(record.secondary_artifact_link().is_none());
    }

    #[tokio::test]
    async fn test_error_after_completed_clears_artifacts() {
        let (_store, receiver) = receiver();
        receiver
            .receive(CallbackPayload {
                primary_artifact_id: Some("OLD".to_string()),
                ..payload("flip")
            })
            .await
            .unwrap();
        let record = receiver
            .receive(CallbackPayload {
                status: Some(JobStatus::Error),
                error: Some("regenerate failed".to_string()),
                ..payload("flip")
            })
            .await
            .unwrap();
        assert!(record.primary_artifact_id.is_none());
        assert!(record.primary_artifact_link().is_none());
    }

    #[tokio::test]
    async fn test_repeated_callback_converges() {
        let (store, receiver) = receiver();
        let body = CallbackPayload {
            primary_artifact_id: Some("A".to_string()),
            secondary_artifact_id: Some("B".to_string()),
            ..payload("twice")
        };
        let first = receiver.receive(body.clone()).await.unwrap();
        let second = receiver.receive(body).await.unwrap();

        assert_eq!(store.get_all().await.unwrap().len(), 1);
        assert_eq!(first.status, second.status);
        assert_eq!(first.primary_artifact_id, second.primary_artifact_id);
        assert_eq!(first.secondary_artifact_id, second.secondary_artifact_id);
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_blank_artifact_ids_count_as_absent() {
        let (_store, receiver) = receiver();
        let record = receiver
            .receive(CallbackPayload {
                primary_artifact_id: Some("P".to_string()),
                secondary_artifact_id: Some(String::new()),
                ..payload("half")
            })
            .await
            .unwrap();
        assert!(record.secondary_artifact_id.is_none());
        assert!(record.secondary_artifact_link().is_none());
    }

    #[tokio::test]
    async fn test_simulate_writes_mock_artifacts() {
        let (_store, receiver) = receiver();
        let record = receiver.simulate(Some("sim_1".to_string())).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(
            record.primary_artifact_link(),
            Some(artifact_link(MOCK_PRIMARY_ARTIFACT_ID))
        );
        assert_eq!(
            record.secondary_artifact_link(),
            Some(artifact_link(MOCK_SECONDARY_ARTIFACT_ID))
        );
    }

    #[tokio::test]
    async fn test_simulate_generates_id_when_absent() {
        let (_store, receiver) = receiver();
        let record = receiver.simulate(None).await.unwrap();
        assert!(record.job_id.starts_with("doc_"));
    }
}
