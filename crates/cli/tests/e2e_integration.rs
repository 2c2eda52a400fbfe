//! End-to-end smoke test for the gateway the CLI wraps: builds the router
//! from a default configuration and drives it with `tower::ServiceExt`
//! rather than a bound socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use functionsdo_config::AppConfig;
use functionsdo_gateway::{build_router, AppState};
use tower::ServiceExt;

#[tokio::test]
async fn health_endpoint_is_reachable() {
    let state = Arc::new(AppState::new(AppConfig::default()));
    let router = build_router(state);

    let response = router.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn public_status_endpoint_has_no_versioned_variant() {
    let state = Arc::new(AppState::new(AppConfig::default()));
    let router = build_router(state);

    let bare = router.clone().oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(bare.status(), StatusCode::OK);

    // Public paths (health, root, status) are exempt from the version-prefix
    // duplication rule that applies to the authenticated API surface.
    let versioned = router.oneshot(Request::builder().uri("/v1/api/status").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(versioned.status(), StatusCode::NOT_FOUND);
}
