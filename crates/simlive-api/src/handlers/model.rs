//! /sessions/:id/{upload,model,run,redraw,drag} handlers — model and
//! diagram operations.

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use simlive_core::engine::Diagram;
use simlive_core::{Bounds, LayoutParams};
use simlive_services::{ModelView, RunView};

use super::{ApiError, ApiState};

/// Diagram wrapper shared by `redraw` and `drag`.
#[derive(Serialize)]
pub struct LayoutResponse {
    pub layout: Diagram,
}

// ── /sessions/:id/upload ──────────────────────────────────────────────────────

/// Multipart form: the model as an `sbml` (or `model`) part, plus
/// `width`, `height`, and optional `gravity` / `stiffness`.
pub async fn handle_upload(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ModelView>, ApiError> {
    let session = state.store.get(&session_id)?;
    let defaults = state.store.settings().layout;

    let mut model: Option<String> = None;
    let mut width: Option<f64> = None;
    let mut height: Option<f64> = None;
    let mut gravity = defaults.gravity;
    let mut stiffness = defaults.stiffness;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        let text = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("field '{field_name}': {e}")))?;

        match field_name.as_str() {
            "sbml" | "model" => model = Some(text),
            "width" => width = Some(parse_number(&field_name, &text)?),
            "height" => height = Some(parse_number(&field_name, &text)?),
            "gravity" => gravity = parse_number(&field_name, &text)?,
            "stiffness" => stiffness = parse_number(&field_name, &text)?,
            other => tracing::debug!(field = other, "ignoring unknown upload field"),
        }
    }

    let model = model.ok_or_else(|| ApiError::bad_request("missing 'sbml' part"))?;
    let (width, height) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        _ => return Err(ApiError::bad_request("'width' and 'height' are required")),
    };

    let view = session
        .upload(
            &model,
            Bounds::new(width, height),
            LayoutParams { gravity, stiffness },
        )
        .await?;
    Ok(Json(view))
}

fn parse_number(field: &str, text: &str) -> Result<f64, ApiError> {
    text.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("'{field}' must be a number, got '{text}'")))
}

// ── /sessions/:id/run ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RunRequest {
    pub start: f64,
    pub end: f64,
    pub steps: usize,
}

pub async fn handle_run(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunView>, ApiError> {
    let session = state.store.get(&session_id)?;
    Ok(Json(session.run(req.start, req.end, req.steps).await?))
}

// ── /sessions/:id/redraw ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RedrawRequest {
    pub width: f64,
    pub height: f64,
}

pub async fn handle_redraw(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<RedrawRequest>,
) -> Result<Json<LayoutResponse>, ApiError> {
    let session = state.store.get(&session_id)?;
    let layout = session.redraw(Bounds::new(req.width, req.height)).await?;
    Ok(Json(LayoutResponse { layout }))
}

// ── /sessions/:id/model ───────────────────────────────────────────────────────

/// The stored model text, for download.
pub async fn handle_model_download(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.store.get(&session_id)?;
    let text = session.model_text().await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text.to_string(),
    ))
}

// ── /sessions/:id/drag ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DragRequest {
    /// Node id.
    pub id: String,
    pub dx: f64,
    pub dy: f64,
}

pub async fn handle_drag(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<DragRequest>,
) -> Result<Json<LayoutResponse>, ApiError> {
    let session = state.store.get(&session_id)?;
    let layout = session.drag(&req.id, req.dx, req.dy).await?;
    Ok(Json(LayoutResponse { layout }))
}
