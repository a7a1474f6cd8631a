use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use lovenote_notify::NotificationPayload;
use lovenote_types::api::{PushSendRequest, PushSendResponse, PushSubscribeRequest, SuccessResponse};
use lovenote_types::models::{NotificationCategory, Role};

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::state::AppState;

/// Only the admin may act on behalf of the other user.
pub(crate) fn ensure_self_or_admin(caller: &Caller, user_id: Uuid) -> Result<(), ApiError> {
    if caller.user_id == user_id || caller.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

pub(crate) fn ensure_user_exists(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    match state.db.get_user(user_id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound("Không tìm thấy người dùng")),
    }
}

pub async fn subscribe(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<PushSubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self_or_admin(&caller, req.user_id)?;
    ensure_user_exists(&state, req.user_id)?;

    let sub = &req.subscription;
    if sub.endpoint.trim().is_empty() || sub.keys.p256dh.is_empty() || sub.keys.auth.is_empty() {
        return Err(ApiError::BadRequest("Thông tin đăng ký thông báo không hợp lệ".into()));
    }

    state.db.upsert_push_subscription(
        req.user_id,
        &sub.endpoint,
        &sub.keys.p256dh,
        &sub.keys.auth,
        req.user_agent.as_deref(),
        Utc::now(),
    )?;
    info!("Push subscription saved for {}", req.user_id);

    Ok(Json(SuccessResponse::ok()))
}

pub async fn send(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<PushSendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self_or_admin(&caller, req.user_id)?;
    ensure_user_exists(&state, req.user_id)?;

    let category = NotificationCategory::from_tag(&req.kind);
    let payload = NotificationPayload::for_event(category, req.data.as_ref(), Utc::now());
    let report = state.notifier.send(req.user_id, &payload).await;

    Ok(Json(PushSendResponse {
        success: true,
        sent: report.sent,
        failed: report.failed,
    }))
}
