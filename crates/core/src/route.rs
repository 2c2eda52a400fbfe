//! Per-request context built by the router before middleware and handlers run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the resolved API version came from, in priority order: path segment,
/// query parameter, `Accept-Version` header, `X-Api-Version` header, default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiVersionSource {
    Path,
    Query,
    AcceptVersion,
    XApiVersion,
    Default,
}

impl ApiVersionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersionSource::Path => "path",
            ApiVersionSource::Query => "query",
            ApiVersionSource::AcceptVersion => "accept-version",
            ApiVersionSource::XApiVersion => "x-api-version",
            ApiVersionSource::Default => "default",
        }
    }
}

/// The authenticated identity attached to a request once the auth stage
/// succeeds. Immutable for the request's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
    /// A non-secret fragment of the credential, safe to log (e.g. last 4 chars).
    pub token_hint: String,
    pub is_api_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<String>>,
}

/// Per-request routing context assembled by the router.
#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    pub params: HashMap<String, String>,
    pub function_id: Option<String>,
    pub version: Option<String>,
    pub api_version: String,
    pub api_version_source: Option<ApiVersionSourceWrapper>,
    pub auth: Option<AuthContext>,
}

/// Wraps [`ApiVersionSource`] so `RouteContext` can `#[derive(Default)]`
/// without needing a default variant on the source enum itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersionSourceWrapper(pub ApiVersionSource);

impl RouteContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_source_strings_match_wire_vocabulary() {
        assert_eq!(ApiVersionSource::Path.as_str(), "path");
        assert_eq!(ApiVersionSource::Query.as_str(), "query");
        assert_eq!(ApiVersionSource::AcceptVersion.as_str(), "accept-version");
        assert_eq!(ApiVersionSource::XApiVersion.as_str(), "x-api-version");
        assert_eq!(ApiVersionSource::Default.as_str(), "default");
    }
}
