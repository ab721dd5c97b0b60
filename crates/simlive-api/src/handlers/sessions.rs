//! /sessions handlers — create, inspect, reset, and drop sessions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use simlive_services::SessionSummary;

use super::{Ack, ApiError, ApiState};

// ── /sessions (POST) ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct LoadResponse {
    pub session_id: String,
}

pub async fn handle_load(
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<LoadResponse>), ApiError> {
    let session = state.store.create_fresh()?;
    Ok((
        StatusCode::CREATED,
        Json(LoadResponse {
            session_id: session.id().to_string(),
        }),
    ))
}

// ── /sessions/:id (GET) ───────────────────────────────────────────────────────

pub async fn handle_session_inspect(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let session = state.store.get(&session_id)?;
    Ok(Json(session.summary().await?))
}

// ── /sessions/:id (DELETE) ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionDropResponse {
    pub session_id: String,
    pub dropped: bool,
}

pub async fn handle_session_drop(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDropResponse>, ApiError> {
    state.store.remove(&session_id).await?;
    tracing::info!(session = %session_id, "session dropped via API");
    Ok(Json(SessionDropResponse {
        session_id,
        dropped: true,
    }))
}

// ── /sessions/:id/reset ───────────────────────────────────────────────────────

pub async fn handle_reset(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    state.store.get(&session_id)?.reset().await?;
    Ok(Ack::ok())
}
