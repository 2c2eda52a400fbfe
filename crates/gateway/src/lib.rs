//! The Functions.do HTTP gateway: router assembly and the middleware chain.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use functionsdo_config::AppConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::field::Empty;
use tracing::info;

pub use state::AppState;

/// Builds the full router: every path exists twice, once bare and once under
/// `/v1`, sharing the same handlers (spec's backward-compatibility rule).
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/functions", get(handlers::list_functions).post(handlers::deploy_function))
        .route(
            "/api/functions/{id}",
            get(handlers::get_function).patch(handlers::patch_function).delete(handlers::delete_function),
        )
        .route("/functions/{id}", post(handlers::invoke_function))
        .route("/functions/{id}/invoke", post(handlers::invoke_function))
        .route("/functions/{id}/logs", get(handlers::logs_handler))
        .route("/cascade/{id}", post(handlers::cascade_invoke))
        .route("/api/auth/validate", get(handlers::auth_validate))
        .route("/api/auth/me", get(handlers::auth_me))
        .route("/api/auth/orgs", get(handlers::auth_orgs))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::csrf_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth_middleware));

    let tasks = Router::new()
        .route("/api/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route("/api/tasks/{id}", get(handlers::get_task))
        .route("/api/tasks/{id}/respond", post(handlers::respond_task))
        .route("/api/tasks/{id}/cancel", post(handlers::cancel_task))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::csrf_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth_middleware));

    let public = Router::new()
        .route("/", get(handlers::health_handler))
        .route("/health", get(handlers::health_handler))
        .route("/api/status", get(handlers::status_handler));

    let versioned = Router::new()
        .nest("/v1", api.clone().merge(tasks.clone()))
        .merge(api)
        .merge(tasks)
        .merge(public);

    // Same-origin by default; deployments needing browser cross-origin access
    // configure an explicit allowlist at the reverse proxy.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::exact(format!("http://{}:{}", state.config.gateway.host, state.config.gateway.port).parse().unwrap()))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION, axum::http::HeaderName::from_static("x-api-key")])
        .max_age(std::time::Duration::from_secs(3600));

    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<axum::body::Body>| {
        tracing::info_span!(
            "http_request",
            method = %req.method(),
            route = %req.uri().path(),
            correlation_id = Empty,
            api_version = Empty,
            tenant = Empty,
        )
    });

    versioned
        .fallback(handlers::not_found_fallback)
        .layer(axum::middleware::from_fn(middleware::error_envelope_fallback))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::correlation_and_version_middleware))
        .layer(DefaultBodyLimit::max(state.config.gateway.max_body_bytes))
        .layer(cors)
        .layer(trace)
        .with_state(state)
}

/// Builds the application state and router from config, and serves it until
/// SIGINT/SIGTERM; in-flight webhook deliveries and the task sweeper are left
/// to drain on their own, never rolled back.
pub async fn start(config: AppConfig) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(AppState::new(config));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "functions.do gateway listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const API_KEY: &str = "fd_test_key";
    const TENANT: &str = "tester";

    /// Builds app state from `config` with a fresh in-memory storage backend
    /// and a registered API key, so requests can authenticate without an
    /// OAuth backend.
    async fn state_from(config: AppConfig) -> Arc<AppState> {
        let mut state = AppState::new(config);
        let mem = Arc::new(functionsdo_storage::MemoryStorage::new());
        mem.register_api_key(API_KEY, TENANT).await;
        state.storage = Arc::new(
            functionsdo_storage::StorageFacade::new().with_default(functionsdo_storage::Coordinator {
                registry: mem.clone(),
                code: mem.clone(),
                api_keys: Some(mem),
            }),
        );
        Arc::new(state)
    }

    async fn test_state() -> Arc<AppState> {
        state_from(AppConfig::default()).await
    }

    async fn send(router: &Router, method: &str, uri: &str, api_key: Option<&str>, body: Option<Value>) -> (StatusCode, Value, axum::http::HeaderMap) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        let request = if let Some(body) = body {
            builder.header(axum::http::header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())).unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, value, headers)
    }

    async fn deploy(router: &Router, id: &str, body: Value) {
        let mut body = body;
        body["id"] = json!(id);
        let (status, _, _) = send(router, "POST", "/api/functions", Some(API_KEY), Some(body)).await;
        assert_eq!(status, StatusCode::OK, "deploying {id}");
    }

    #[tokio::test]
    async fn health_endpoint() {
        let router = build_router(test_state().await);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_version_header_is_echoed_and_defaults_to_v1() {
        let router = build_router(test_state().await);

        let (status, _, headers) = send(&router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("x-api-version").unwrap(), "v1");

        let request = Request::builder().uri("/health").header("x-api-version", "v2").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.headers().get("x-api-version").unwrap(), "v2");
    }

    #[tokio::test]
    async fn numeric_version_header_is_normalized_to_v_prefixed_form() {
        let router = build_router(test_state().await);
        let request = Request::builder().uri("/health").header("x-api-version", "2").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.headers().get("x-api-version").unwrap(), "v2");
    }

    #[tokio::test]
    async fn function_id_that_looks_like_a_version_is_not_mistaken_for_one() {
        let router = build_router(test_state().await);
        deploy(&router, "v2", json!({ "type": "code" })).await;

        // "v2" only shows up as the function id here, not a leading path
        // segment, so it must not be picked up as the API version.
        let (status, _, headers) = send(&router, "POST", "/functions/v2/invoke", Some(API_KEY), Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(headers.get("x-api-version").unwrap(), "v1");
    }

    #[tokio::test]
    async fn request_id_is_echoed_on_the_response() {
        let router = build_router(test_state().await);
        let request = Request::builder().uri("/health").header("x-request-id", "req-123").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-123");
    }

    #[tokio::test]
    async fn method_not_allowed_is_wrapped_in_the_error_envelope() {
        let router = build_router(test_state().await);
        // `/health` only has a GET route registered.
        let request = Request::builder().method("POST").uri("/health").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"]["message"].as_str().unwrap().contains("method not allowed"));
    }

    #[tokio::test]
    async fn csrf_is_bypassed_for_api_key_authenticated_requests() {
        let router = build_router(test_state().await);

        // A state-changing POST with no CSRF token but a valid API key must
        // not be rejected by the CSRF stage.
        let (status, body, _) = send(
            &router,
            "POST",
            "/api/tasks",
            Some(API_KEY),
            Some(json!({ "function_id": "needs-review", "assignees": ["alice"] })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED, "body: {body}");
    }

    #[tokio::test]
    async fn invoke_with_missing_code_returns_404() {
        let router = build_router(test_state().await);
        deploy(&router, "no-code-fn", json!({ "type": "code" })).await;

        let (status, body, _) = send(&router, "POST", "/functions/no-code-fn/invoke", Some(API_KEY), Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"]["message"].as_str().unwrap().contains("code not found"));
    }

    #[tokio::test]
    async fn classifier_disabled_defaults_unclassified_function_to_code_tier() {
        let mut config = AppConfig::default();
        config.classifier.enabled = false;
        let router = build_router(state_from(config).await);

        // No `type` given and no classifier configured: falls back to the
        // code tier's own default, which 404s with no code stored.
        deploy(&router, "untyped-fn", json!({})).await;
        let (status, _, _) = send(&router, "POST", "/functions/untyped-fn/invoke", Some(API_KEY), Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn code_tier_without_executor_returns_501() {
        let router = build_router(test_state().await);
        deploy(&router, "real-code-fn", json!({ "type": "code", "code": "export function handler(input) { return input; }" })).await;

        let (status, body, _) = send(&router, "POST", "/functions/real-code-fn/invoke", Some(API_KEY), Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED, "body: {body}");
        assert!(body["error"].as_str().unwrap().contains("No code executor"));
    }

    #[tokio::test]
    async fn cascade_fail_fast_stops_at_first_failing_step() {
        let router = build_router(test_state().await);
        deploy(&router, "cascade-step-a", json!({ "type": "code" })).await;
        deploy(&router, "cascade-step-b", json!({ "type": "human", "assignees": ["alice"] })).await;
        deploy(
            &router,
            "pipeline-fail-fast",
            json!({
                "type": "cascade",
                "error_handling": "fail-fast",
                "steps": [
                    { "function_id": "cascade-step-a", "tier": "code" },
                    { "function_id": "cascade-step-b", "tier": "human" },
                ],
            }),
        )
        .await;

        let (status, _, _) = send(&router, "POST", "/functions/pipeline-fail-fast/invoke", Some(API_KEY), Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cascade_fallback_continues_past_failure_to_next_step() {
        let router = build_router(test_state().await);
        deploy(&router, "cascade-step-a2", json!({ "type": "code" })).await;
        deploy(&router, "cascade-step-b2", json!({ "type": "human", "assignees": ["alice"] })).await;
        deploy(
            &router,
            "pipeline-fallback",
            json!({
                "type": "cascade",
                "error_handling": "fallback",
                "steps": [
                    { "function_id": "cascade-step-a2", "tier": "code", "fallback_to": "cascade-step-b2" },
                    { "function_id": "cascade-step-b2", "tier": "human" },
                ],
            }),
        )
        .await;

        let (status, body, _) = send(&router, "POST", "/functions/pipeline-fallback/invoke", Some(API_KEY), Some(json!({}))).await;
        assert_eq!(status, StatusCode::ACCEPTED, "body: {body}");
    }

    #[tokio::test]
    async fn rate_limit_refusal_returns_429_with_retry_after() {
        let mut config = AppConfig::default();
        config.rate_limit.ip_capacity = 0;
        let router = build_router(state_from(config).await);

        let (status, _, headers) = send(&router, "GET", "/api/functions", Some(API_KEY), None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(headers.contains_key("retry-after"));
    }

    #[tokio::test]
    async fn missing_credentials_returns_401() {
        let router = build_router(test_state().await);
        let (status, body, _) = send(&router, "GET", "/api/functions", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"]["message"].as_str().unwrap().contains("missing credentials"));
    }

    #[tokio::test]
    async fn invalid_api_key_returns_401() {
        let router = build_router(test_state().await);
        let (status, body, _) = send(&router, "GET", "/api/functions", Some("not-a-real-key"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"]["message"].as_str().unwrap().contains("invalid API key"));
    }

    #[tokio::test]
    async fn bearer_token_without_oauth_backend_returns_501() {
        let router = build_router(test_state().await);
        let request = Request::builder()
            .method("GET")
            .uri("/api/functions")
            .header(axum::http::header::AUTHORIZATION, "Bearer some-oauth-token")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn human_task_lifecycle_create_respond_list() {
        let router = build_router(test_state().await);

        let (status, created, _) =
            send(&router, "POST", "/api/tasks", Some(API_KEY), Some(json!({ "function_id": "approve-refund", "assignees": ["bob"] }))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let task_id = created["task_id"].as_str().unwrap().to_string();

        let (status, fetched, _) = send(&router, "GET", &format!("/api/tasks/{task_id}"), Some(API_KEY), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["status"], "pending");

        let (status, responded, _) =
            send(&router, "POST", &format!("/api/tasks/{task_id}/respond"), Some(API_KEY), Some(json!({ "approved": true }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(responded["status"], "completed");

        let (status, list, _) = send(&router, "GET", "/api/tasks?status=completed", Some(API_KEY), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }
}
