//! /sessions/:id/{get_param,set_param,set_sim_param} handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use simlive_services::{SimParam, SimParams};

use super::{Ack, ApiError, ApiState};

#[derive(Deserialize)]
pub struct GetParamRequest {
    pub param: String,
}

#[derive(Serialize)]
pub struct ParamValue {
    pub param: String,
    pub value: f64,
}

pub async fn handle_get_param(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<GetParamRequest>,
) -> Result<Json<ParamValue>, ApiError> {
    let session = state.store.get(&session_id)?;
    let value = session.get_param(&req.param).await?;
    Ok(Json(ParamValue {
        param: req.param,
        value,
    }))
}

#[derive(Deserialize)]
pub struct SetParamRequest {
    pub param: String,
    pub value: f64,
}

pub async fn handle_set_param(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<SetParamRequest>,
) -> Result<Json<Ack>, ApiError> {
    let session = state.store.get(&session_id)?;
    session.set_param(&req.param, req.value).await?;
    Ok(Ack::ok())
}

/// Accepts `stepFrequency` or `stepSize`; responds with the new cadence.
pub async fn handle_set_sim_param(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<SetParamRequest>,
) -> Result<Json<SimParams>, ApiError> {
    let session = state.store.get(&session_id)?;
    let param = SimParam::parse(&req.param)?;
    Ok(Json(session.set_sim_param(param, req.value).await?))
}
