pub mod health;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::daemon::callback::CallbackReceiver;
use crate::daemon::reader::StatusReader;
use crate::models::RelayConfig;
use crate::pipeline::{JobSubmitter, PipelineTransport};
use crate::storage::StatusStore;

/// Shared application state for the Axum server.
pub struct AppState {
    pub store: Arc<dyn StatusStore>,
    pub submitter: JobSubmitter,
    pub receiver: CallbackReceiver,
    pub reader: StatusReader,
    pub config: Arc<RelayConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the submitter, receiver and reader around one status store.
    pub fn new(
        config: Arc<RelayConfig>,
        store: Arc<dyn StatusStore>,
        transport: Arc<dyn PipelineTransport>,
    ) -> Self {
        Self {
            submitter: JobSubmitter::new(Arc::clone(&config), transport),
            receiver: CallbackReceiver::new(Arc::clone(&store), config.callback_default_status),
            reader: StatusReader::new(Arc::clone(&store)),
            store,
            config,
            start_time: Instant::now(),
        }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/webhook/send", post(routes::submit_job))
        .route(
            "/api/webhook/callback",
            post(routes::receive_callback).get(routes::list_documents),
        )
        .route("/api/webhook/test", post(routes::test_pipeline))
        .route("/api/test-callback", post(routes::test_callback))
        .route("/api/documents/status/{id}", get(routes::document_status))
        .route("/api/debug", get(routes::debug_info))
        .route("/api/debug/documents/{id}", get(routes::inspect_document))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
