use axum::{Json, extract::State, response::IntoResponse};

use lovenote_types::api::{CheckStatusRequest, CheckStatusResponse, LoginRequest, LoginResponse};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.gate.login(
        &req.token,
        &req.fingerprint,
        req.user_agent.as_deref(),
        req.ip_hash.as_deref(),
    )?;

    Ok(Json(LoginResponse {
        success: true,
        user_id: outcome.user_id,
        role: outcome.role,
    }))
}

pub async fn check_status(
    State(state): State<AppState>,
    Json(req): Json<CheckStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.gate.check_status(&req.token, &req.fingerprint)?;

    Ok(Json(CheckStatusResponse {
        success: true,
        is_approved: status.is_approved,
        needs_approval: status.needs_approval,
    }))
}
