//! HTTP API handlers — session-scoped operations as JSON, plus the live
//! WebSocket.

pub mod live;
pub mod model;
pub mod params;
pub mod sessions;
pub mod status;

use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use simlive_core::SessionError;
use simlive_services::SessionStore;

#[derive(Clone)]
pub struct ApiState {
    pub store: SessionStore,
    pub started_at: Instant,
    /// Shutdown broadcast sender — signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl ApiState {
    pub fn new(store: SessionStore, shutdown_tx: tokio::sync::broadcast::Sender<()>) -> Self {
        Self {
            store,
            started_at: Instant::now(),
            shutdown_tx,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error body: `{"error": kind, "message": text}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError(StatusCode, ErrorBody);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        SessionError::InvalidParameter(message.into()).into()
    }
}

pub fn status_for(err: &SessionError) -> StatusCode {
    match err {
        SessionError::UnknownSession(_) => StatusCode::NOT_FOUND,
        SessionError::DuplicateSession(_)
        | SessionError::ModelNotLoaded
        | SessionError::InvalidRunState { .. } => StatusCode::CONFLICT,
        SessionError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        SessionError::SessionLimit(_) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::Engine(_) | SessionError::Layout(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError(
            status_for(&err),
            ErrorBody {
                error: err.kind(),
                message: err.to_string(),
            },
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

/// Plain acknowledgement for operations with no payload.
#[derive(Serialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    fn ok() -> Json<Self> {
        Json(Ack { ok: true })
    }
}

// Re-export handler functions for use in router setup.
pub use live::handle_live;
pub use model::{handle_drag, handle_model_download, handle_redraw, handle_run, handle_upload};
pub use params::{handle_get_param, handle_set_param, handle_set_sim_param};
pub use sessions::{handle_load, handle_reset, handle_session_drop, handle_session_inspect};
pub use status::{handle_shutdown, handle_status};
