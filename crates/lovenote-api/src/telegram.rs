use axum::{Extension, Json, extract::State, response::IntoResponse};

use lovenote_notify::Alert;
use lovenote_types::api::{AlertKind, SuccessResponse, TelegramAlertRequest};

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::state::AppState;

/// Queue an admin alert for a client-side event. Delivery is best-effort;
/// the response never waits on Telegram.
pub async fn alert(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<TelegramAlertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let alert = match req.kind {
        AlertKind::Reaction => Alert::ReactionCreated {
            sender: caller.role,
            emoji: req.emoji.unwrap_or_else(|| "❤️".to_string()),
        },
        AlertKind::Message => Alert::MessageCreated {
            sender: caller.role,
            content: req
                .content
                .ok_or_else(|| ApiError::BadRequest("Thiếu nội dung tin nhắn".into()))?,
        },
        AlertKind::Memory => Alert::MemorySent { sender: caller.role },
    };

    state.alerts.notify(alert);
    Ok(Json(SuccessResponse::ok()))
}
