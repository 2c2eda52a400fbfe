//! Error types for the Functions.do domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant, composed into the
//! top-level [`Error`] via `#[from]`.

use thiserror::Error;

/// The top-level error type for all Functions.do operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name} — {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Blocked by network policy: {0}")]
    Blocked(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool not available in this environment: {0}")]
    NotAvailable(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage not configured")]
    NotConfigured,

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found")]
    NotFound,

    #[error("task is already in a terminal state")]
    Terminal,

    #[error("task has expired")]
    Expired,

    #[error("response missing required field: {0}")]
    MissingField(String),
}

/// The stable machine-readable error codes shared across the gateway.
/// Non-exhaustive by design — new contexts may need new codes without
/// breaking existing matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingRequired,
    InvalidFunctionId,
    FunctionNotFound,
    PayloadTooLarge,
    InvalidJson,
    CsrfInvalid,
    Unauthenticated,
    RateLimited,
    ExecutorUnavailable,
    ExecutionTimeout,
    ExecutionFailed,
    ServiceUnavailable,
    InternalError,
    CascadeExhausted,
    TaskExpired,
    MethodNotAllowed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingRequired => "MISSING_REQUIRED",
            ErrorCode::InvalidFunctionId => "INVALID_FUNCTION_ID",
            ErrorCode::FunctionNotFound => "FUNCTION_NOT_FOUND",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::CsrfInvalid => "CSRF_INVALID",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ExecutorUnavailable => "EXECUTOR_UNAVAILABLE",
            ErrorCode::ExecutionTimeout => "EXECUTION_TIMEOUT",
            ErrorCode::ExecutionFailed => "EXECUTION_FAILED",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::CascadeExhausted => "CASCADE_EXHAUSTED",
            ErrorCode::TaskExpired => "TASK_EXPIRED",
            ErrorCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
        }
    }
}
