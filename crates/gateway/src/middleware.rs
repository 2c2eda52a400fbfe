//! The request pipeline stages: correlation id + API version resolution,
//! authentication, rate limiting, and CSRF verification. Ordered in
//! `lib::build_router` from innermost to outermost.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use functionsdo_core::error::ErrorCode;
use functionsdo_core::ids::correlation_id;
use functionsdo_core::route::{ApiVersionSource, ApiVersionSourceWrapper, AuthContext, RouteContext};
use functionsdo_ratelimit::Subject;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::error_response;
use crate::state::AppState;

static VERSION_PATH_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v\d+$").unwrap());
static API_KEY_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(sk_|pk_|fn_|api_|key_)").unwrap());

const PUBLIC_PATHS: &[&str] = &["/", "/health", "/api/status"];

/// Normalizes a bare numeric version (`"2"`) to the `v<n>` form every other
/// source already uses; leaves anything else (including an already-prefixed
/// `"v2"`) untouched.
fn normalize_version(raw: &str) -> String {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("v{raw}")
    } else {
        raw.to_string()
    }
}

fn resolve_api_version(req: &Request) -> (String, ApiVersionSource) {
    if let Some(segment) = req.uri().path().split('/').find(|s| !s.is_empty()) {
        if VERSION_PATH_SEGMENT.is_match(segment) {
            return (segment.to_string(), ApiVersionSource::Path);
        }
    }
    if let Some(v) = req.uri().query().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes()).find(|(k, _)| k == "version").map(|(_, v)| v.into_owned())
    }) {
        return (normalize_version(&v), ApiVersionSource::Query);
    }
    if let Some(v) = req.headers().get("accept-version").and_then(|v| v.to_str().ok()) {
        return (normalize_version(v), ApiVersionSource::AcceptVersion);
    }
    if let Some(v) = req.headers().get("x-api-version").and_then(|v| v.to_str().ok()) {
        return (normalize_version(v), ApiVersionSource::XApiVersion);
    }
    ("v1".to_string(), ApiVersionSource::Default)
}

/// Stamps a correlation id and resolves the API version, storing a
/// [`RouteContext`] in request extensions for downstream stages and
/// handlers, and echoes `X-API-Version`/`X-Request-ID` on the way out.
pub async fn correlation_and_version_middleware(mut req: Request, next: Next) -> Response {
    let correlation = correlation_id(req.headers().get("x-request-id").and_then(|v| v.to_str().ok()));
    let (version, source) = resolve_api_version(&req);

    tracing::Span::current().record("correlation_id", correlation.as_str()).record("api_version", version.as_str());

    let mut ctx = RouteContext::default();
    ctx.version = Some(version.clone());
    ctx.api_version = version.clone();
    ctx.api_version_source = Some(ApiVersionSourceWrapper(source));
    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(CorrelationId(correlation.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&version) {
        response.headers_mut().insert("x-api-version", value);
    }
    if let Ok(value) = HeaderValue::from_str(&correlation) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

#[derive(Clone)]
pub struct CorrelationId(pub String);

/// Resolves the caller's identity: public paths pass through unauthenticated;
/// an `X-API-Key` header or a bearer token matching the API-key prefix family
/// resolves against the default tenant's key store; any other bearer token
/// needs a configured [`crate::state::OAuthValidator`], else 501.
pub async fn auth_middleware(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let correlation = req.extensions().get::<CorrelationId>().map(|c| c.0.clone()).unwrap_or_default();
    let path = req.uri().path().to_string();

    if PUBLIC_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let api_key = req.headers().get("x-api-key").and_then(|v| v.to_str().ok()).map(str::to_string);
    let bearer = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let auth = if let Some(key) = api_key.as_deref().or(bearer.as_deref().filter(|t| API_KEY_PREFIX.is_match(t))) {
        match resolve_api_key(&state, key).await {
            Some(ctx) => ctx,
            None => return error_response(StatusCode::UNAUTHORIZED, ErrorCode::Unauthenticated, "invalid API key", &correlation),
        }
    } else if let Some(token) = bearer {
        match &state.oauth {
            Some(validator) => match validator.validate(&token).await {
                Some(ctx) => ctx,
                None => return error_response(StatusCode::UNAUTHORIZED, ErrorCode::Unauthenticated, "invalid bearer token", &correlation),
            },
            None => {
                return error_response(StatusCode::NOT_IMPLEMENTED, ErrorCode::ServiceUnavailable, "no OAuth credential backend configured", &correlation)
            }
        }
    } else {
        return error_response(StatusCode::UNAUTHORIZED, ErrorCode::Unauthenticated, "missing credentials", &correlation);
    };

    tracing::Span::current().record("tenant", auth.user_id.as_str());
    if let Some(ctx) = req.extensions_mut().get_mut::<RouteContext>() {
        ctx.auth = Some(auth);
    }
    next.run(req).await
}

async fn resolve_api_key(state: &AppState, key: &str) -> Option<AuthContext> {
    let coordinator = state.storage.coordinator_for(None).ok()?;
    let store = coordinator.api_keys.as_ref()?;
    let user_id = store.resolve(key).await.ok().flatten()?;
    Some(AuthContext {
        user_id,
        scopes: Vec::new(),
        expires_at: chrono::Utc::now() + chrono::Duration::days(365),
        token_hint: key.chars().rev().take(4).collect::<String>().chars().rev().collect(),
        is_api_key: true,
        current_org: None,
        organizations: None,
    })
}

/// Applies IP- and function-scoped limits in sequence; the first exceeded
/// limit wins and reports its own `Retry-After`.
pub async fn rate_limit_middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let correlation = req.extensions().get::<CorrelationId>().map(|c| c.0.clone()).unwrap_or_default();
    let cf_ip = req.headers().get("cf-connecting-ip").and_then(|v| v.to_str().ok());
    let xff = req.headers().get("x-forwarded-for").and_then(|v| v.to_str().ok());
    let ip_subject = Subject::from_headers(cf_ip, xff);

    let ip_decision = state
        .rate_limiter
        .check_and_increment(ip_subject.key(), state.config.rate_limit.ip_capacity, std::time::Duration::from_millis(state.config.rate_limit.ip_window_ms))
        .await;
    if !ip_decision.allowed {
        return rate_limited_response(&ip_decision, &correlation);
    }

    if let Some(function_id) = function_id_from_path(req.uri().path()) {
        let fn_decision = state
            .rate_limiter
            .check_and_increment(
                Subject::Function(function_id).key(),
                state.config.rate_limit.function_capacity,
                std::time::Duration::from_millis(state.config.rate_limit.function_window_ms),
            )
            .await;
        if !fn_decision.allowed {
            return rate_limited_response(&fn_decision, &correlation);
        }
    }

    next.run(req).await
}

static FUNCTION_ID_IN_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:functions|cascade)/([A-Za-z][A-Za-z0-9_-]*)").unwrap());

fn function_id_from_path(path: &str) -> Option<String> {
    FUNCTION_ID_IN_PATH.captures(path).map(|c| c[1].to_string())
}

fn rate_limited_response(decision: &functionsdo_ratelimit::Decision, correlation: &str) -> Response {
    let retry_after = decision.retry_after_secs(std::time::Instant::now());
    let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimited, "rate limit exceeded", correlation);
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert("retry-after", value);
    }
    response
}

/// Verifies the CSRF token for state-changing, non-API-key requests.
pub async fn csrf_middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let correlation = req.extensions().get::<CorrelationId>().map(|c| c.0.clone()).unwrap_or_default();
    let has_api_key = req.headers().contains_key("x-api-key");
    let has_bearer = req.headers().get(axum::http::header::AUTHORIZATION).is_some();
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();

    if state.csrf.bypasses(&method, &path, has_api_key, has_bearer) {
        return next.run(req).await;
    }

    let header_token = req.headers().get("x-csrf-token").and_then(|v| v.to_str().ok()).map(str::to_string);
    let cookie_token = req
        .headers()
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| extract_cookie(cookies, &state.csrf.cookie_name));

    if !state.csrf.verify(header_token.as_deref(), cookie_token.as_deref()) {
        return error_response(StatusCode::FORBIDDEN, ErrorCode::CsrfInvalid, "missing or invalid CSRF token", &correlation);
    }
    next.run(req).await
}

fn extract_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|kv| {
        let (k, v) = kv.split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// Wraps non-2xx responses that bypassed a handler's own error envelope
/// (e.g. axum extractor rejections, unmatched methods) into the canonical
/// shape.
pub async fn error_envelope_fallback(req: Request<Body>, next: Next) -> Response {
    let correlation = req.extensions().get::<CorrelationId>().map(|c| c.0.clone()).unwrap_or_default();
    let response = next.run(req).await;
    match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => {
            error_response(StatusCode::PAYLOAD_TOO_LARGE, ErrorCode::PayloadTooLarge, "request body too large", &correlation)
        }
        StatusCode::METHOD_NOT_ALLOWED => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, ErrorCode::MethodNotAllowed, "method not allowed for this route", &correlation)
        }
        _ => response,
    }
}
