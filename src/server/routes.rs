use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::errors::RelayError;
use crate::models::{CallbackPayload, DocumentStatus, JobStatus, SubmitRequest};

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub job_id: String,
}

/// Envelope around a single document status.
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub document: DocumentStatus,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub success: bool,
    pub documents: Vec<DocumentStatus>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSummary {
    pub pipeline_url: &'static str,
    pub public_base_url: Option<String>,
    pub callback_default_status: JobStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugResponse {
    pub success: bool,
    pub message: String,
    pub environment: EnvironmentSummary,
    pub documents: Vec<DocumentStatus>,
    pub document_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub success: bool,
    pub message: String,
    pub pipeline_response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCallbackRequest {
    #[serde(default, alias = "documentId")]
    pub job_id: Option<String>,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RelayError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| RelayError::Validation(rejection.body_text()))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/webhook/send
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, RelayError> {
    let request = json_body(payload)?;
    let receipt = state.submitter.submit(request).await?;

    Ok(Json(SubmitResponse {
        success: true,
        message: "Data sent to webhook successfully".to_string(),
        job_id: receipt.job_id,
    }))
}

/// POST /api/webhook/callback
pub async fn receive_callback(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallbackPayload>, JsonRejection>,
) -> Result<Json<DocumentResponse>, RelayError> {
    let payload = json_body(payload).inspect_err(|e| tracing::warn!("Callback rejected: {}", e))?;
    let record = state
        .receiver
        .receive(payload)
        .await
        .inspect_err(|e| tracing::warn!("Callback rejected: {}", e))?;

    Ok(Json(DocumentResponse {
        success: true,
        message: Some("Callback processed successfully".to_string()),
        document: DocumentStatus::from(&record),
    }))
}

/// GET /api/webhook/callback
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentListResponse>, RelayError> {
    let documents = state.reader.list().await?;
    tracing::debug!("Listing {} documents", documents.len());

    Ok(Json(DocumentListResponse {
        success: true,
        count: documents.len(),
        documents,
    }))
}

/// GET /api/documents/status/{id}
pub async fn document_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, RelayError> {
    let document = state.reader.read(&id).await?;
    let message = document
        .created_at
        .is_none()
        .then(|| "Document is still being processed".to_string());

    Ok(Json(DocumentResponse {
        success: true,
        message,
        document,
    }))
}

/// GET /api/debug/documents/{id}
pub async fn inspect_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, RelayError> {
    let document = state.reader.inspect(&id).await?;
    Ok(Json(DocumentResponse {
        success: true,
        message: None,
        document,
    }))
}

/// GET /api/debug
pub async fn debug_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DebugResponse>, RelayError> {
    let documents = state.reader.list().await?;
    let environment = EnvironmentSummary {
        pipeline_url: if state.config.pipeline_endpoint().is_some() {
            "set"
        } else {
            "not set"
        },
        public_base_url: state.config.public_base().map(str::to_string),
        callback_default_status: state.config.callback_default_status,
    };

    Ok(Json(DebugResponse {
        success: true,
        message: "Debug information".to_string(),
        environment,
        document_count: documents.len(),
        documents,
        timestamp: Utc::now(),
    }))
}

/// POST /api/webhook/test
pub async fn test_pipeline(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PingResponse>, RelayError> {
    let pipeline_response = state.submitter.ping().await?;
    Ok(Json(PingResponse {
        success: true,
        message: "Webhook test successful - pipeline responded".to_string(),
        pipeline_response,
        timestamp: Utc::now(),
    }))
}

/// POST /api/test-callback
///
/// The body is optional; without a job id one is generated.
pub async fn test_callback(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<DocumentResponse>, RelayError> {
    let request: TestCallbackRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TestCallbackRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let record = state.receiver.simulate(request.job_id).await?;
    Ok(Json(DocumentResponse {
        success: true,
        message: Some("Test callback processed successfully".to_string()),
        document: DocumentStatus::from(&record),
    }))
}
