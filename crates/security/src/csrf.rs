//! CSRF middleware support — token generation and constant-time verification
//! for state-changing requests on browser (non-API-key) paths.

use rand::RngCore;

/// An exclude pattern for paths that never require CSRF protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExcludePattern {
    Exact(String),
    Prefix(String),
}

impl ExcludePattern {
    /// Parse `"exact/path"`, `"prefix/*"`, or `"prefix/**"` into a pattern.
    pub fn parse(raw: &str) -> Self {
        if let Some(prefix) = raw.strip_suffix("/**").or_else(|| raw.strip_suffix("/*")) {
            ExcludePattern::Prefix(prefix.to_string())
        } else {
            ExcludePattern::Exact(raw.to_string())
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            ExcludePattern::Exact(p) => p == path,
            ExcludePattern::Prefix(p) => path == *p || path.starts_with(&format!("{p}/")),
        }
    }
}

pub struct CsrfPolicy {
    pub cookie_name: String,
    pub excludes: Vec<ExcludePattern>,
}

impl Default for CsrfPolicy {
    fn default() -> Self {
        Self { cookie_name: "csrf".into(), excludes: Vec::new() }
    }
}

impl CsrfPolicy {
    pub fn new(cookie_name: impl Into<String>, excludes: Vec<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            excludes: excludes.iter().map(|p| ExcludePattern::parse(p)).collect(),
        }
    }

    /// Whether the CSRF check is bypassed for this request shape.
    pub fn bypasses(&self, method: &str, path: &str, has_api_key: bool, has_bearer: bool) -> bool {
        let method = method.to_ascii_uppercase();
        if matches!(method.as_str(), "GET" | "HEAD" | "OPTIONS") {
            return true;
        }
        if has_api_key || has_bearer {
            return true;
        }
        self.excludes.iter().any(|p| p.matches(path))
    }

    /// Verify the header token against the cookie token in constant time.
    /// Both must be non-empty; length mismatches reject without early exit
    /// on content, and the full comparison always runs regardless of an
    /// early byte mismatch.
    pub fn verify(&self, header_token: Option<&str>, cookie_token: Option<&str>) -> bool {
        let (header, cookie) = match (header_token, cookie_token) {
            (Some(h), Some(c)) if !h.is_empty() && !c.is_empty() => (h.as_bytes(), c.as_bytes()),
            _ => return false,
        };
        constant_time_eq(header, cookie)
    }

    /// `Set-Cookie` value for a freshly generated CSRF token.
    pub fn set_cookie_header(&self, token: &str) -> String {
        format!("{}={token}; Path=/; SameSite=Strict; Secure; Max-Age=86400", self.cookie_name)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Generate a fresh 32-byte token, hex-encoded to 64 characters.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn get_requests_bypass() {
        let policy = CsrfPolicy::default();
        assert!(policy.bypasses("GET", "/web/submit", false, false));
        assert!(policy.bypasses("HEAD", "/web/submit", false, false));
        assert!(policy.bypasses("OPTIONS", "/web/submit", false, false));
    }

    #[test]
    fn api_key_bypasses_post() {
        let policy = CsrfPolicy::default();
        assert!(policy.bypasses("POST", "/web/submit", true, false));
        assert!(policy.bypasses("POST", "/web/submit", false, true));
        assert!(!policy.bypasses("POST", "/web/submit", false, false));
    }

    #[test]
    fn exact_exclude_pattern() {
        let policy = CsrfPolicy::new("csrf", vec!["/webhooks/stripe".into()]);
        assert!(policy.bypasses("POST", "/webhooks/stripe", false, false));
        assert!(!policy.bypasses("POST", "/webhooks/stripe/extra", false, false));
    }

    #[test]
    fn prefix_exclude_pattern() {
        let policy = CsrfPolicy::new("csrf", vec!["/webhooks/*".into()]);
        assert!(policy.bypasses("POST", "/webhooks/stripe", false, false));
        assert!(policy.bypasses("POST", "/webhooks/stripe/nested", false, false));
        assert!(!policy.bypasses("POST", "/other", false, false));
    }

    #[test]
    fn matching_tokens_verify() {
        let policy = CsrfPolicy::default();
        assert!(policy.verify(Some("abc123"), Some("abc123")));
    }

    #[test]
    fn mismatched_tokens_fail() {
        let policy = CsrfPolicy::default();
        assert!(!policy.verify(Some("abc123"), Some("xyz999")));
    }

    #[test]
    fn different_length_tokens_fail() {
        let policy = CsrfPolicy::default();
        assert!(!policy.verify(Some("short"), Some("muchlongertoken")));
    }

    #[test]
    fn missing_token_fails() {
        let policy = CsrfPolicy::default();
        assert!(!policy.verify(None, Some("abc123")));
        assert!(!policy.verify(Some("abc123"), None));
        assert!(!policy.verify(Some(""), Some("")));
    }

    #[test]
    fn cookie_header_has_required_attributes() {
        let policy = CsrfPolicy::default();
        let header = policy.set_cookie_header("deadbeef");
        assert!(header.contains("csrf=deadbeef"));
        assert!(header.contains("SameSite=Strict"));
        assert!(header.contains("Secure"));
        assert!(header.contains("Max-Age=86400"));
        assert!(!header.contains("HttpOnly"));
    }
}
