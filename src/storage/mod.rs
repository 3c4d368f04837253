pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentRecord, RecordUpdate};

pub use memory::InMemoryStatusStore;

/// Registry of document-generation jobs, keyed by job id.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Merge `update` into the record for `job_id`, creating a `processing`
    /// record first if none exists. Returns the record as written.
    async fn set(&self, job_id: &str, update: RecordUpdate) -> Result<DocumentRecord>;
    async fn get(&self, job_id: &str) -> Result<Option<DocumentRecord>>;
    /// Every record, newest `created_at` first.
    async fn get_all(&self) -> Result<Vec<DocumentRecord>>;
}
