//! Error envelope helpers shared by every handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use functionsdo_core::envelope::ErrorEnvelope;
use functionsdo_core::error::ErrorCode;

/// Build the canonical `{error, correlationId, requestId}` error response.
pub fn error_response(status: StatusCode, code: ErrorCode, message: impl Into<String>, correlation_id: &str) -> Response {
    (status, Json(ErrorEnvelope::new(code, message, correlation_id))).into_response()
}

pub fn bad_request(code: ErrorCode, message: impl Into<String>, correlation_id: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message, correlation_id)
}

pub fn not_found(message: impl Into<String>, correlation_id: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, ErrorCode::FunctionNotFound, message, correlation_id)
}

pub fn unauthenticated(message: impl Into<String>, correlation_id: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, ErrorCode::Unauthenticated, message, correlation_id)
}

pub fn internal(message: impl Into<String>, correlation_id: &str) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, message, correlation_id)
}
