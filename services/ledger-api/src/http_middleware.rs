//! HTTP middleware: TLS enforcement and the verifier response header pair
//! (`X-Request-ID`, `Cache-Control`) per §6.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Rejects non-HTTPS requests (honoring `X-Forwarded-Proto`) with 400
/// `tls_required` when `TLS_REQUIRED=true`.
pub async fn enforce_tls(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if state.config.tls_required {
        let proto = req
            .headers()
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok());
        if proto != Some("https") {
            return ApiError::new(StatusCode::BAD_REQUEST, "tls_required", "TLS is required")
                .into_response();
        }
    }
    next.run(req).await
}

/// Echoes `X-Request-ID` (synthesising a UUIDv4 when absent) and sets
/// `Cache-Control: private, max-age=30` on verifier endpoint responses.
pub async fn verifier_response_headers(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
        .headers_mut()
        .insert("cache-control", HeaderValue::from_static("private, max-age=30"));
    response
}
