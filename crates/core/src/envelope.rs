//! The canonical error envelope shared by every component that can fail a
//! request.

use serde::Serialize;

use crate::error::ErrorCode;

/// `{ "code": ..., "message": ... }`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// `{ "error": {...}, "correlationId": ..., "requestId": ... }`.
///
/// `correlationId` and `requestId` are the same value in this implementation
/// (the correlation id generated or reused at the top of the middleware
/// chain) — kept as two fields because the wire contract names both.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
    pub correlation_id: String,
    pub request_id: String,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        let correlation_id = correlation_id.into();
        Self {
            error: ErrorBody {
                code: code.as_str(),
                message: message.into(),
            },
            request_id: correlation_id.clone(),
            correlation_id,
        }
    }
}
