use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};

use lovenote_gateway::connection::{self, IdentityVerifier};

use crate::middleware::{require_admin, require_device};
use crate::state::AppState;
use crate::{ai, auth, cron, devices, interactions, preferences, push, schedules, telegram};

/// All HTTP and WebSocket routes. Cross-cutting layers (CORS, tracing) are
/// added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route("/devices/check-status", post(auth::check_status))
        .route("/cron/notifications", get(cron::notifications))
        .route("/external-cron/notifications", get(cron::external_notifications))
        .route("/gateway", get(ws_upgrade));

    let device_routes = Router::new()
        .route("/push/subscribe", post(push::subscribe))
        .route("/push/send", post(push::send))
        .route("/telegram/alert", post(telegram::alert))
        .route("/ai/generate-message", post(ai::generate_message))
        .route("/ai/quick-replies", post(ai::quick_replies))
        .route(
            "/user/preferences",
            get(preferences::get_preferences).post(preferences::update_preferences),
        )
        .route("/memories", get(interactions::list_memories).post(interactions::create_memory))
        .route("/memories/count", get(interactions::count_memories))
        .route("/reactions", get(interactions::list_reactions).post(interactions::create_reaction))
        .route("/messages", get(interactions::list_messages).post(interactions::create_message))
        .route("/daily-notifications", get(interactions::list_daily_notifications))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_device));

    let admin_routes = Router::new()
        .route("/devices", get(devices::list_devices))
        .route("/devices/approve", post(devices::update_device))
        .route(
            "/admin/schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_device));

    Router::new()
        .merge(public_routes)
        .merge(device_routes)
        .merge(admin_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let realtime = state.realtime.clone();
    let verifier: Arc<dyn IdentityVerifier> = state.gate.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, realtime, verifier))
}
