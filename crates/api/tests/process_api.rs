//! HTTP-level integration tests for the internal process endpoint and the
//! output star endpoint.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{
    auth_token, build_test_app, expect_status, post_json_auth, TEST_INTERNAL_SECRET, TEST_MODEL,
};
use sqlx::PgPool;
use tower::ServiceExt;

use lumen_core::params::GenerationParams;
use lumen_db::models::generation::CreateGeneration;
use lumen_db::models::output::CreateOutput;
use lumen_db::models::status::GenerationStatus;
use lumen_db::repositories::{GenerationRepo, JobRepo, OutputRepo, SessionRepo};

async fn seed_generation(pool: &PgPool, user_id: i64) -> i64 {
    let session = SessionRepo::create(pool, user_id, "process session").await.unwrap();
    GenerationRepo::create(
        pool,
        &CreateGeneration {
            session_id: session.id,
            user_id,
            model_id: TEST_MODEL.to_string(),
            prompt: "a quiet harbor".to_string(),
            negative_prompt: None,
            params: GenerationParams::default(),
        },
    )
    .await
    .unwrap()
    .id
}

/// POST /generate/process with the internal secret header.
async fn post_process(app: Router, secret: &str, body: Option<serde_json::Value>) -> axum::http::Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/generate/process")
        .header("x-internal-secret", secret);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

// ---------------------------------------------------------------------------
// Internal process
// ---------------------------------------------------------------------------

/// A wrong internal secret and a fully anonymous call are both 401.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_process_rejects_unauthenticated_callers(pool: PgPool) {
    let response = post_process(build_test_app(pool.clone()), "wrong", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/generate/process")
        .body(Body::empty())
        .unwrap();
    let response = build_test_app(pool).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// A bearer token works in place of the internal secret.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_process_accepts_bearer_token(pool: PgPool) {
    let id = seed_generation(&pool, 1).await;
    let token = auth_token(1);

    let body = serde_json::json!({ "generation_id": id });
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/generate/process",
        body,
        &token,
    )
    .await;
    let json = expect_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["outcomes"][0]["outcome"], "completed");
}

/// Without a body, the endpoint drains one queue batch and resolves jobs.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_process_drains_queue_batch(pool: PgPool) {
    let id = seed_generation(&pool, 1).await;
    JobRepo::enqueue(&pool, id).await.unwrap();

    let response = post_process(build_test_app(pool.clone()), TEST_INTERNAL_SECRET, None).await;
    let json = expect_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["claimed"], 1);
    assert_eq!(json["data"]["outcomes"][0]["generation_id"], id);
    assert_eq!(json["data"]["outcomes"][0]["outcome"], "completed");

    let row = GenerationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(row.status_id, GenerationStatus::Completed.id());
    assert!(
        JobRepo::find_by_generation(&pool, id).await.unwrap().is_none(),
        "resolved jobs must be deleted"
    );
}

/// With a generation id in the body, that one generation runs inline.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_process_single_generation(pool: PgPool) {
    let id = seed_generation(&pool, 1).await;

    let body = serde_json::json!({ "generation_id": id });
    let response =
        post_process(build_test_app(pool.clone()), TEST_INTERNAL_SECRET, Some(body)).await;
    let json = expect_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["outcomes"][0]["outcome"], "completed");

    let row = GenerationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(row.status_id, GenerationStatus::Completed.id());
}

/// A nonexistent generation id is a 404, not a silent no-op.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_process_unknown_generation(pool: PgPool) {
    let body = serde_json::json!({ "generation_id": 999_999 });
    let response = post_process(build_test_app(pool), TEST_INTERNAL_SECRET, Some(body)).await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}

// ---------------------------------------------------------------------------
// Output starring
// ---------------------------------------------------------------------------

async fn seed_output(pool: &PgPool, generation_id: i64) -> i64 {
    let outputs = OutputRepo::create_many(
        pool,
        generation_id,
        &[CreateOutput {
            file_url: "https://assets.test/outputs/1/0.png".to_string(),
            media_type: "image".to_string(),
            width: 1024,
            height: 1024,
            duration_secs: None,
        }],
    )
    .await
    .unwrap();
    outputs[0].id
}

/// Starring one of the caller's outputs flips the flag.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_star_output(pool: PgPool) {
    let generation_id = seed_generation(&pool, 1).await;
    let output_id = seed_output(&pool, generation_id).await;
    let token = auth_token(1);

    let body = serde_json::json!({ "starred": true });
    let response = post_json_auth(
        build_test_app(pool.clone()),
        &format!("/api/v1/outputs/{output_id}/star"),
        body,
        &token,
    )
    .await;
    let json = expect_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["starred"], true);

    let body = serde_json::json!({ "starred": false });
    let response = post_json_auth(
        build_test_app(pool),
        &format!("/api/v1/outputs/{output_id}/star"),
        body,
        &token,
    )
    .await;
    let json = expect_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["starred"], false);
}

/// Another user's output reads as 404.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_star_foreign_output_is_not_found(pool: PgPool) {
    let generation_id = seed_generation(&pool, 1).await;
    let output_id = seed_output(&pool, generation_id).await;
    let token = auth_token(2);

    let body = serde_json::json!({ "starred": true });
    let response = post_json_auth(
        build_test_app(pool),
        &format!("/api/v1/outputs/{output_id}/star"),
        body,
        &token,
    )
    .await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}
