//! /status, /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use simlive_core::SessionError;
use simlive_services::SessionSummary;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub session_count: usize,
    /// 0 = unlimited.
    pub max_sessions: usize,
    pub sessions: Vec<SessionSummary>,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let mut sessions = Vec::new();
    for id in state.store.ids() {
        // Sessions removed since the snapshot are skipped.
        if let Ok(summary) = summarize(&state, id.as_str()).await {
            sessions.push(summary);
        }
    }
    sessions.sort_by_key(|s| s.created_at);

    Json(StatusResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        session_count: sessions.len(),
        max_sessions: state.store.settings().max_sessions,
        sessions,
    })
}

async fn summarize(state: &ApiState, id: &str) -> Result<SessionSummary, SessionError> {
    state.store.get(id)?.summary().await
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());
    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
