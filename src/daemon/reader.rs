use std::sync::Arc;

use crate::errors::RelayError;
use crate::models::DocumentStatus;
use crate::storage::StatusStore;

/// Read side of the status registry.
///
/// [`read`](Self::read) is what pollers use: an unknown id is reported as
/// `processing`, since its callback may simply not have arrived yet.
/// [`inspect`](Self::inspect) is the strict variant for debugging a single
/// id and fails with `NotFound` instead.
pub struct StatusReader {
    store: Arc<dyn StatusStore>,
}

impl StatusReader {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    pub async fn read(&self, job_id: &str) -> Result<DocumentStatus, RelayError> {
        match self.store.get(job_id).await? {
            Some(record) => Ok(DocumentStatus::from(&record)),
            None => {
                tracing::debug!("No status stored for '{}', reporting processing", job_id);
                Ok(DocumentStatus::pending(job_id))
            }
        }
    }

    pub async fn inspect(&self, job_id: &str) -> Result<DocumentStatus, RelayError> {
        self.store
            .get(job_id)
            .await?
            .map(|record| DocumentStatus::from(&record))
            .ok_or_else(|| RelayError::NotFound(format!("No document with id '{}'", job_id)))
    }

    pub async fn list(&self) -> Result<Vec<DocumentStatus>, RelayError> {
        Ok(self
            .store
            .get_all()
            .await?
            .iter()
            .map(DocumentStatus::from)
            .collect())
    }
}
