//! Security module for Functions.do — CSRF protection and path validation.
//!
//! Provides:
//! - **CSRF**: double-submit token generation and verification for
//!   state-changing, non-API-key requests
//! - **Path validation**: filesystem sandboxing to workspace directory

pub mod csrf;
pub mod path;

pub use csrf::{generate_token as generate_csrf_token, CsrfPolicy, ExcludePattern};
pub use path::{validate_path, PathValidationError};
