use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use uuid::Uuid;

use lovenote_types::models::Role;

use crate::error::ApiError;
use crate::state::AppState;

pub const FINGERPRINT_HEADER: &str = "x-device-fingerprint";

/// The authenticated principal, inserted as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    pub device_id: Uuid,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Static role token in `Authorization` plus an approved device fingerprint.
pub async fn require_device(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::InvalidToken)?;
    let fingerprint = req
        .headers()
        .get(FINGERPRINT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Thiếu mã thiết bị".into()))?;

    let caller = state.gate.authenticate(token, fingerprint)?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

/// Layer inside `require_device`; rejects anyone but the admin.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    match req.extensions().get::<Caller>() {
        Some(caller) if caller.role == Role::Admin => Ok(next.run(req).await),
        _ => Err(ApiError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(bearer_token(&headers), Some("s3cret"));
    }
}
