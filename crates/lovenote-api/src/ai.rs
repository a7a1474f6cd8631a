use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;

use lovenote_types::api::{
    GenerateMessageRequest, GenerateMessageResponse, QuickRepliesRequest, QuickRepliesResponse,
};

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::push::{ensure_self_or_admin, ensure_user_exists};
use crate::state::AppState;

/// Today's AI message for `userId`, generated on first request of the day.
pub async fn generate_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<GenerateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self_or_admin(&caller, req.user_id)?;
    ensure_user_exists(&state, req.user_id)?;

    let notification = state.daily.today_for(req.user_id, Utc::now()).await?;
    Ok(Json(GenerateMessageResponse {
        success: true,
        notification,
    }))
}

pub async fn quick_replies(
    State(state): State<AppState>,
    Json(req): Json<QuickRepliesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Thiếu nội dung tin nhắn".into()));
    }

    let replies = state
        .generator
        .generate_quick_replies(&req.message, req.context.as_deref(), req.seed)
        .await;
    Ok(Json(QuickRepliesResponse {
        success: true,
        replies,
    }))
}
