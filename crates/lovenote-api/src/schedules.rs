use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use lovenote_types::api::CreateScheduleRequest;

use crate::daily::parse_schedule_time;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_schedules(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let schedules = state.db.list_schedules(false)?;
    Ok(Json(json!({ "success": true, "schedules": schedules })))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let time = req.time.trim();
    parse_schedule_time(time).map_err(|_| ApiError::BadRequest("Giờ phải có dạng HH:MM".into()))?;

    let schedule = state.db.insert_schedule(time, Utc::now())?;
    info!("Daily schedule added at {}", schedule.time);
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "schedule": schedule }))))
}
