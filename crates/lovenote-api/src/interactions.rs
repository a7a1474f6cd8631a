use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, warn};

use lovenote_notify::{Alert, NotificationPayload};
use lovenote_types::api::{CountResponse, CreateMessageRequest, CreateReactionRequest, ListQuery};
use lovenote_types::events::GatewayEvent;
use lovenote_types::models::{NotificationCategory, Role};

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::state::AppState;

const MAX_LIST: u32 = 200;
const MAX_MESSAGE_CHARS: usize = 500;
const MAX_EMOJI_CHARS: usize = 16;

/// Push to the partner and, for client actions, alert the admin. Runs on a
/// spawned task so the write never waits on either.
fn fan_out(state: &AppState, caller: Caller, category: NotificationCategory, data: Value, alert: Alert) {
    if caller.role == Role::Client {
        state.alerts.notify(alert);
    }

    let state = state.clone();
    tokio::spawn(async move {
        let partner = match state.db.find_user_by_role(caller.role.counterpart()) {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("No {} user yet, skipping push", caller.role.counterpart());
                return;
            }
            Err(e) => {
                warn!("Failed to look up partner for push: {}", e);
                return;
            }
        };
        let payload = NotificationPayload::for_event(category, Some(&data), Utc::now());
        state.notifier.send(partner.id, &payload).await;
    });
}

pub async fn create_memory(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let memory = state.db.insert_memory(caller.user_id, caller.role, Utc::now())?;

    state.realtime.publish(GatewayEvent::MemoryCreated { memory: memory.clone() });
    fan_out(
        &state,
        caller,
        NotificationCategory::Memory,
        json!({ "memoryId": memory.id }),
        Alert::MemorySent { sender: caller.role },
    );

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "memory": memory }))))
}

pub async fn list_memories(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = query.user_id.unwrap_or(caller.user_id);
    let memories = state.db.list_memories(user_id, query.limit.min(MAX_LIST))?;
    Ok(Json(json!({ "success": true, "memories": memories })))
}

/// Memories the partner sent; polled by the admin dashboard.
pub async fn count_memories(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.db.count_memories(Some(caller.role.counterpart()))?;
    Ok(Json(CountResponse { success: true, count }))
}

pub async fn create_reaction(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let emoji = req.emoji.trim();
    if emoji.is_empty() || emoji.chars().count() > MAX_EMOJI_CHARS {
        return Err(ApiError::BadRequest("Cảm xúc không hợp lệ".into()));
    }

    let reaction = state.db.insert_reaction(caller.user_id, emoji, Utc::now())?;

    state.realtime.publish(GatewayEvent::ReactionCreated { reaction: reaction.clone() });
    fan_out(
        &state,
        caller,
        NotificationCategory::Reaction,
        json!({ "emoji": reaction.emoji }),
        Alert::ReactionCreated {
            sender: caller.role,
            emoji: reaction.emoji.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "reaction": reaction }))))
}

pub async fn list_reactions(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = query.user_id.unwrap_or(caller.user_id);
    let reactions = state.db.list_reactions(user_id, query.limit.min(MAX_LIST))?;
    Ok(Json(json!({ "success": true, "reactions": reactions })))
}

pub async fn create_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim();
    if content.is_empty() || content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest("Tin nhắn trống hoặc quá dài".into()));
    }

    let message = state.db.insert_message(
        caller.user_id,
        content,
        req.kind,
        req.emoji.as_deref(),
        Utc::now(),
    )?;

    state.realtime.publish(GatewayEvent::MessageCreated { message: message.clone() });
    fan_out(
        &state,
        caller,
        NotificationCategory::Message,
        json!({ "content": message.content }),
        Alert::MessageCreated {
            sender: caller.role,
            content: message.content.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "message": message }))))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = query.user_id.unwrap_or(caller.user_id);
    let messages = state.db.list_messages(user_id, query.limit.min(MAX_LIST))?;
    Ok(Json(json!({ "success": true, "messages": messages })))
}

pub async fn list_daily_notifications(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = query.user_id.unwrap_or(caller.user_id);
    let notifications = state
        .db
        .list_daily_notifications(user_id, query.limit.min(MAX_LIST))?;
    Ok(Json(json!({ "success": true, "notifications": notifications })))
}
