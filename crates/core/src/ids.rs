//! Function id validation and the correlation id helper.
//!
//! A function id is a slug: it must start with a letter, may contain
//! letters/digits/underscores, and may use single hyphens as separators —
//! no leading, trailing, or consecutive hyphens, capped at 64 characters.

use std::fmt;

use uuid::Uuid;

/// Maximum length of a function id.
pub const MAX_FUNCTION_ID_LEN: usize = 64;

/// A validated function id.
///
/// Construct via [`FunctionId::parse`]; there is no public constructor that
/// skips validation, so every `FunctionId` in the system satisfies the slug
/// invariant above.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct FunctionId(String);

/// Why a candidate function id was rejected.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FunctionIdError {
    #[error("function id must not be empty")]
    Empty,
    #[error("function id exceeds {MAX_FUNCTION_ID_LEN} characters")]
    TooLong,
    #[error("function id must match ^[A-Za-z][A-Za-z0-9_]*(-[A-Za-z0-9_]+)*$")]
    InvalidShape,
}

impl FunctionId {
    /// Validate and wrap a candidate function id.
    pub fn parse(candidate: impl Into<String>) -> Result<Self, FunctionIdError> {
        let candidate = candidate.into();
        if candidate.is_empty() {
            return Err(FunctionIdError::Empty);
        }
        if candidate.len() > MAX_FUNCTION_ID_LEN {
            return Err(FunctionIdError::TooLong);
        }
        if !is_valid_shape(&candidate) {
            return Err(FunctionIdError::InvalidShape);
        }
        Ok(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> serde::Deserialize<'de> for FunctionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FunctionId::parse(s).map_err(serde::de::Error::custom)
    }
}

/// `^[A-Za-z][A-Za-z0-9_]*(-[A-Za-z0-9_]+)*$`, hand-rolled (no leading,
/// trailing, or consecutive hyphens; first char is a letter).
fn is_valid_shape(s: &str) -> bool {
    let bytes = s.as_bytes();
    if !bytes[0].is_ascii_alphabetic() {
        return false;
    }

    let mut prev_was_hyphen = false;
    for (i, &b) in bytes.iter().enumerate() {
        let is_word = b.is_ascii_alphanumeric() || b == b'_';
        let is_hyphen = b == b'-';

        if !is_word && !is_hyphen {
            return false;
        }
        if is_hyphen {
            if prev_was_hyphen || i == 0 || i == bytes.len() - 1 {
                return false;
            }
            prev_was_hyphen = true;
        } else {
            prev_was_hyphen = false;
        }
    }
    true
}

/// Generate or reuse a per-request correlation id.
///
/// Honors an incoming `X-Request-ID` header value verbatim (so a caller's own
/// tracing id threads through); otherwise mints a fresh UUID v4. Takes the
/// already-extracted header value so this crate stays free of an HTTP
/// framework dependency — the gateway crate does the header lookup.
pub fn correlation_id(request_id_header: Option<&str>) -> String {
    request_id_header
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
