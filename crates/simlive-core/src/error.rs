//! Error taxonomy shared by the services, the HTTP layer, and the engines.

use crate::protocol::RunState;

/// Failures reported by a simulation engine. Opaque to the orchestration
/// layer: they are surfaced to the caller or the push channel, never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("model parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("unknown model quantity: {0}")]
    UnknownName(String),
    #[error("invalid time range: {0}")]
    InvalidRange(String),
    #[error("numerical failure: {0}")]
    Numerical(String),
    #[error("engine backend failure: {0}")]
    Backend(String),
}

/// Failures reported by a layout engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("unknown diagram node: {0}")]
    UnknownNode(String),
    #[error("invalid bounds {width}x{height}")]
    InvalidBounds { width: f64, height: f64 },
    #[error("model has nothing to lay out")]
    EmptyModel,
    #[error("layout model error: {0}")]
    Model(String),
}

/// Everything a session-scoped operation can fail with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("session already exists: {0}")]
    DuplicateSession(String),
    #[error("session limit reached ({0} sessions)")]
    SessionLimit(usize),
    #[error("no model loaded for this session")]
    ModelNotLoaded,
    #[error("'{command}' is not valid while {state}")]
    InvalidRunState {
        command: &'static str,
        state: RunState,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl SessionError {
    /// Stable snake_case identifier used in HTTP bodies and push frames.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::UnknownSession(_) => "unknown_session",
            SessionError::DuplicateSession(_) => "duplicate_session",
            SessionError::SessionLimit(_) => "session_limit",
            SessionError::ModelNotLoaded => "model_not_loaded",
            SessionError::InvalidRunState { .. } => "invalid_run_state",
            SessionError::InvalidParameter(_) => "invalid_parameter",
            SessionError::Engine(_) => "engine_failure",
            SessionError::Layout(_) => "layout_failure",
        }
    }
}
