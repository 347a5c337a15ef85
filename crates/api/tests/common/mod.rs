use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use conveyor_api::config::ServerConfig;
use conveyor_api::router::build_app_router;
use conveyor_api::state::AppState;
use conveyor_dispatch::Dispatcher;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        heartbeat_timeout_secs: 30,
        sweep_interval_secs: 10,
        max_task_retries: 3,
        sync_wait_timeout_secs: 30,
        max_sync_wait_secs: 60,
        default_worker_concurrency: 1,
    }
}

/// Build the full application router with all middleware layers.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses. The returned router is cheap to
/// clone and clones share the same dispatcher, so multi-request tests can
/// fire each request at a fresh clone.
#[allow(dead_code)]
pub fn build_test_app() -> Router {
    let config = test_config();
    let state = AppState::new(config.clone());
    build_app_router(state, &config)
}

/// Like [`build_test_app`], but also hands back the dispatcher for direct
/// state inspection.
#[allow(dead_code)]
pub fn build_test_app_with_dispatcher() -> (Router, Arc<Dispatcher>) {
    let config = test_config();
    let state = AppState::new(config.clone());
    let dispatcher = Arc::clone(&state.dispatcher);
    (build_app_router(state, &config), dispatcher)
}

/// Issue a GET request against the app.
#[allow(dead_code)]
pub async fn get(app: Router, uri: &str) -> Response<axum::body::Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds"),
    )
    .await
    .expect("infallible service")
}

/// Issue a POST request with a JSON body against the app.
#[allow(dead_code)]
pub async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
) -> Response<axum::body::Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds"),
    )
    .await
    .expect("infallible service")
}

/// Issue a POST request with no body against the app.
#[allow(dead_code)]
pub async fn post_empty(app: Router, uri: &str) -> Response<axum::body::Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .expect("request builds"),
    )
    .await
    .expect("infallible service")
}

/// Collect a response body and parse it as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<axum::body::Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is valid JSON")
}
