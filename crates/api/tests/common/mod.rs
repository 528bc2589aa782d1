//! Shared harness for HTTP-level integration tests.
//!
//! [`build_test_app`] mirrors the router construction in `main.rs` (via
//! [`build_app_router`]) so tests exercise the same middleware stack that
//! production uses, with a stub provider and in-memory blob storage.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use lumen_api::auth::jwt::{generate_access_token, JwtConfig};
use lumen_api::config::{QueueMode, ServerConfig};
use lumen_api::router::build_app_router;
use lumen_api::state::AppState;
use lumen_events::EventBus;
use lumen_pipeline::{PipelineContext, TriggerPool};
use lumen_providers::stub::StubProvider;
use lumen_providers::ProviderRegistry;
use lumen_storage::MemoryBlobStore;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const TEST_INTERNAL_SECRET: &str = "test-internal-secret";

/// Model id registered in the test provider registry.
pub const TEST_MODEL: &str = "demo-image";

/// Build a test `ServerConfig` with safe defaults and queue dispatch, so
/// admission never races a background executor inside a test.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        queue_mode: QueueMode::Queue,
        queue_batch_size: 5,
        job_lock_timeout_secs: 300,
        job_retry_delay_secs: 30,
        max_concurrent_triggers: 2,
        stuck_sweep_interval_secs: 30,
        provider_endpoints: format!("{TEST_MODEL}=stub"),
        webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
        internal_api_secret: Some(TEST_INTERNAL_SECRET.to_string()),
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Build the application state backed by the given provider.
pub fn test_state(pool: PgPool, provider: StubProvider) -> AppState {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(provider));

    let event_bus = Arc::new(EventBus::default());
    let pipeline = PipelineContext {
        pool: pool.clone(),
        registry: Arc::new(registry),
        storage: Arc::new(MemoryBlobStore::new()),
        events: Arc::clone(&event_bus),
    };

    let config = test_config();
    let triggers = Arc::new(TriggerPool::new(
        pipeline.clone(),
        config.max_concurrent_triggers,
    ));

    AppState {
        pool,
        config: Arc::new(config),
        pipeline,
        triggers,
        event_bus,
    }
}

/// Build the full application router with the production middleware stack
/// and a stub provider that completes with one output.
pub fn build_test_app(pool: PgPool) -> Router {
    let state = test_state(pool, StubProvider::completed(TEST_MODEL, 1));
    let config = test_config();
    build_app_router(state, &config)
}

/// Mint a Bearer token for `user_id` signed with the test JWT secret.
pub fn auth_token(user_id: i64) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        access_token_expiry_mins: 15,
    };
    generate_access_token(user_id, &config).expect("token generation should succeed")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn put_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn patch_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method("PATCH")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Read the full response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

/// Assert the status code, then return the parsed body for deeper checks.
pub async fn expect_status(
    response: Response<Body>,
    expected: StatusCode,
) -> serde_json::Value {
    let status = response.status();
    let json = body_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {json}");
    json
}
