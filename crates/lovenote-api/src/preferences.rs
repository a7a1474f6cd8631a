use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;

use lovenote_types::api::{PreferencesQuery, PreferencesResponse, UpdatePreferencesRequest};

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::push::ensure_self_or_admin;
use crate::state::AppState;

pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<PreferencesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self_or_admin(&caller, query.user_id)?;
    let preferences = state.db.get_preferences(query.user_id)?.unwrap_or_default();
    Ok(Json(PreferencesResponse {
        success: true,
        preferences,
    }))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdatePreferencesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self_or_admin(&caller, req.user_id)?;

    let stored = state.db.get_preferences(req.user_id)?.unwrap_or_default();
    let preferences = req.changes.apply_to(stored);
    let valid_hour = |h: Option<u8>| h.is_none_or(|h| h < 24);
    if !valid_hour(preferences.silent_start) || !valid_hour(preferences.silent_end) {
        return Err(ApiError::BadRequest("Giờ im lặng phải từ 0 đến 23".into()));
    }

    state.db.upsert_preferences(req.user_id, &preferences, Utc::now())?;
    Ok(Json(PreferencesResponse {
        success: true,
        preferences,
    }))
}
