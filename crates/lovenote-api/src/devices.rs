use axum::{Json, extract::State, response::IntoResponse};

use lovenote_types::api::{DeviceAction, DeviceActionRequest, DeviceListResponse, SuccessResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// Admin decision on a device: approve, deny (delete) or revoke.
pub async fn update_device(
    State(state): State<AppState>,
    Json(req): Json<DeviceActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match req.action {
        DeviceAction::Approve => state.registry.approve(req.device_id)?,
        DeviceAction::Deny => state.registry.deny(req.device_id)?,
        DeviceAction::Revoke => state.registry.revoke(req.device_id)?,
    };
    Ok(Json(SuccessResponse::ok()))
}

pub async fn list_devices(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let devices = state.registry.list(None)?;
    Ok(Json(DeviceListResponse {
        success: true,
        devices,
    }))
}
