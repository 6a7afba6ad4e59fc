//! HTTP rendering of `HuntError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hunt_core::error::HuntError;

/// Handler error type. Renders `{ "error": <kind>, "message": <text> }`.
#[derive(Debug)]
pub struct AppError(pub HuntError);

impl From<HuntError> for AppError {
    fn from(e: HuntError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match &self.0 {
            HuntError::Internal(e) => tracing::error!(error = ?e, "internal error"),
            HuntError::Conflict(msg) => tracing::warn!(%msg, "request conflicted"),
            _ => tracing::debug!(error = %self.0, "request rejected"),
        }
        let body = serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.user_message(),
        });
        (status, Json(body)).into_response()
    }
}
