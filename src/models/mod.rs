pub mod config;
pub mod document;

pub use config::RelayConfig;
pub use document::{
    artifact_link, CallbackPayload, DocumentRecord, DocumentStatus, JobStatus, PipelineRequest,
    RecordUpdate, SubmitRequest,
};
