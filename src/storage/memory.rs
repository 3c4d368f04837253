use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{DocumentRecord, RecordUpdate};
use crate::storage::StatusStore;

/// Process-lifetime status registry. Nothing is persisted or evicted.
#[derive(Default)]
pub struct InMemoryStatusStore {
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn set(&self, job_id: &str, update: RecordUpdate) -> Result<DocumentRecord> {
        // The write lock spans read-merge-write, so a reader never sees a
        // half-applied update.
        let mut records = self.records.write().await;
        let now = Utc::now();

        let record = records
            .entry(job_id.to_string())
            .or_insert_with(|| DocumentRecord::new(job_id, now));
        record.apply(update);
        // Wall clock may step backwards; updated_at must not.
        record.updated_at = now.max(record.updated_at).max(record.created_at);

        tracing::debug!(
            "Status registry: {} -> {} (updated {})",
            job_id,
            record.status,
            record.updated_at
        );
        Ok(record.clone())
    }

    async fn get(&self, job_id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.records.read().await.get(job_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<DocumentRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<DocumentRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
