//! `ApiError`: the single error type every handler returns, mapping each
//! domain error and each stable string code from §7 onto an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.code, "message": self.message }));
        (self.status, body).into_response()
    }
}

impl From<originseal_core::CoreError> for ApiError {
    fn from(e: originseal_core::CoreError) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string())
    }
}

impl From<originseal_identity::error::IdentityError> for ApiError {
    fn from(e: originseal_identity::error::IdentityError) -> Self {
        let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        ApiError::new(status, e.code(), e.to_string())
    }
}

impl From<originseal_verify::VerifyError> for ApiError {
    fn from(e: originseal_verify::VerifyError) -> Self {
        let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        ApiError::new(status, e.code(), e.to_string())
    }
}

impl From<originseal_verify::AuthError> for ApiError {
    fn from(e: originseal_verify::AuthError) -> Self {
        let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
        ApiError::new(status, e.code(), e.code())
    }
}
