use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::api::error::ErrorKind;

#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    error_kind: ErrorKind,
}

pub fn error_response(
    status: StatusCode,
    kind: ErrorKind,
    message: impl Into<String>,
    details: Option<String>,
) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            details,
            error_kind: kind,
        }),
    )
        .into_response()
}

/// Internal failures keep their full chain server-side; the client sees a
/// generic message plus a short details string.
pub fn internal_error(message: impl Into<String>, detail: impl Into<String>) -> Response {
    let detail = detail.into();
    error!(detail = %detail, "internal api error");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Infra,
        message,
        Some(detail),
    )
}

/// Final PNG bytes with the hardened header set: never cached, never MIME
/// sniffed, locked-down CSP.
pub fn png_response(bytes: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, "no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0")
        .header(header::CONTENT_SECURITY_POLICY, "default-src 'self'")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from(bytes))
        .expect("png response should build")
}
