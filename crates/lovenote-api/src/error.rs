use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use lovenote_types::api::ErrorResponse;
use lovenote_types::models::Role;

pub const INTERNAL_ERROR_TEXT: &str = "Đã xảy ra lỗi máy chủ";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Mã truy cập không hợp lệ")]
    InvalidToken,

    /// The device exists but is pending or revoked.
    #[error("{}", approval_text(.role, .revoked))]
    DeviceNotApproved { role: Role, revoked: bool },

    #[error("Bạn không có quyền thực hiện thao tác này")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// User-facing text for an unapproved device. Always asks for confirmation.
pub fn approval_message(role: Role, revoked: bool) -> &'static str {
    match (role, revoked) {
        (Role::Client, false) => "Thiết bị mới cần được xác nhận. Vui lòng chờ anh xác nhận nhé!",
        (Role::Client, true) => "Thiết bị này đã bị thu hồi. Vui lòng chờ anh xác nhận lại nhé!",
        (Role::Admin, false) => "Thiết bị quản trị mới cần được xác nhận",
        (Role::Admin, true) => "Thiết bị quản trị đã bị thu hồi, cần xác nhận lại",
    }
}

fn approval_text(role: &Role, revoked: &bool) -> &'static str {
    approval_message(*role, *revoked)
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::DeviceNotApproved { .. } | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                INTERNAL_ERROR_TEXT.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
