use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream error: {}", upstream_summary(.status, .body))]
    Upstream { status: Option<u16>, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn upstream_summary(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("pipeline returned {}: {}", code, body),
        None => format!("pipeline unreachable: {}", body),
    }
}

impl RelayError {
    /// Stable machine-readable kind, used as the `code` field of error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation_error",
            RelayError::Configuration(_) => "configuration_error",
            RelayError::Upstream { .. } => "upstream_error",
            RelayError::NotFound(_) => "not_found",
            RelayError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            RelayError::Configuration(_) | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Validation(err.to_string())
    }
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::Internal(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// HTTP mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let details = match &self {
            RelayError::Upstream { status, body } => Some(serde_json::json!({
                "upstreamStatus": status,
                "upstreamBody": body,
            })),
            _ => None,
        };
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.code().to_string(),
            details,
        };
        (self.status_code(), Json(body)).into_response()
    }
}
