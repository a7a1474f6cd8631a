use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::Utc;
use tracing::info;

use lovenote_types::api::{CronQuery, CronResponse};

use crate::error::ApiError;
use crate::gate::secrets_match;
use crate::state::AppState;

pub const CRON_TOKEN_HEADER: &str = "x-cron-token";

/// Platform cron: `Authorization: Bearer <cron secret>`.
pub async fn notifications(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<CronQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let authorized = auth
        .map(|TypedHeader(Authorization(bearer))| secrets_match(bearer.token(), &state.cron_secret))
        .unwrap_or(false);
    if !authorized {
        return Err(ApiError::InvalidToken);
    }
    run(&state, query.force).await
}

/// External cron services that can only set a query string or a custom header.
pub async fn external_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CronQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = query
        .token
        .as_deref()
        .or_else(|| headers.get(CRON_TOKEN_HEADER).and_then(|v| v.to_str().ok()))
        .unwrap_or_default();
    if !secrets_match(presented, &state.cron_secret) {
        return Err(ApiError::InvalidToken);
    }
    run(&state, query.force).await
}

async fn run(state: &AppState, force: bool) -> Result<Json<CronResponse>, ApiError> {
    let sent = state.daily.run_due(Utc::now(), force).await?;
    info!("Cron trigger handled (sent: {})", sent);
    Ok(Json(CronResponse { success: true, sent }))
}
