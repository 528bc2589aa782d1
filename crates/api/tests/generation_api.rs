//! HTTP-level integration tests for the generation lifecycle endpoints:
//! admission, listing, reads, cancel, and dismiss.

mod common;

use axum::http::StatusCode;
use common::{
    auth_token, body_json, build_test_app, expect_status, get_auth, patch_json_auth,
    post_json, post_json_auth, put_auth, TEST_MODEL,
};
use sqlx::PgPool;

use lumen_db::models::status::GenerationStatus;
use lumen_db::repositories::{GenerationRepo, JobRepo, SessionRepo};

const ALICE: i64 = 1;
const BOB: i64 = 2;

async fn create_session(pool: &PgPool, user_id: i64) -> i64 {
    SessionRepo::create(pool, user_id, "test session")
        .await
        .expect("session creation should succeed")
        .id
}

/// Admit a generation through the API and return its id.
async fn admit(pool: &PgPool, app: axum::Router, session_id: i64, token: &str) -> i64 {
    let body = serde_json::json!({
        "session_id": session_id,
        "model_id": TEST_MODEL,
        "prompt": "a lighthouse at dusk",
    });
    let response = post_json_auth(app, "/api/v1/generate", body, token).await;
    let json = expect_status(response, StatusCode::CREATED).await;
    let id = json["data"]["id"].as_i64().expect("response must carry the new id");
    // Sanity: the row exists.
    assert!(GenerationRepo::find_by_id(pool, id).await.unwrap().is_some());
    id
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// A valid request returns 201 with a processing row and an enqueued job.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_generation_success(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let app = build_test_app(pool.clone());
    let token = auth_token(ALICE);

    let body = serde_json::json!({
        "session_id": session_id,
        "model_id": TEST_MODEL,
        "prompt": "  a lighthouse at dusk  ",
        "params": { "aspect_ratio": "16:9" },
    });
    let response = post_json_auth(app, "/api/v1/generate", body, &token).await;
    let json = expect_status(response, StatusCode::CREATED).await;

    assert_eq!(json["data"]["status"], "processing");
    assert_eq!(json["data"]["prompt"], "a lighthouse at dusk", "prompt is trimmed");
    assert_eq!(json["data"]["params"]["aspect_ratio"], "16:9");
    assert_eq!(json["data"]["outputs"], serde_json::json!([]));

    let id = json["data"]["id"].as_i64().unwrap();
    let job = JobRepo::find_by_generation(&pool, id).await.unwrap();
    assert!(job.is_some(), "queue mode must enqueue a job at admission");
}

/// The response params must never expose internal bookkeeping.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_response_hides_internal_params(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let app = build_test_app(pool.clone());
    let token = auth_token(ALICE);

    let id = admit(&pool, app, session_id, &token).await;

    let row = GenerationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(
        !row.parsed_params().debug_trail.is_empty(),
        "admission must stamp the trail"
    );

    let app = build_test_app(pool);
    let response = get_auth(app, &format!("/api/v1/generations/{id}"), &token).await;
    let json = expect_status(response, StatusCode::OK).await;
    assert!(json["data"]["params"].get("debug_trail").is_none());
    assert!(json["data"]["params"].get("provider_correlation").is_none());
}

/// An empty (or whitespace-only) prompt is rejected with 400.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_empty_prompt_rejected(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let app = build_test_app(pool);
    let token = auth_token(ALICE);

    let body = serde_json::json!({
        "session_id": session_id,
        "model_id": TEST_MODEL,
        "prompt": "   ",
    });
    let response = post_json_auth(app, "/api/v1/generate", body, &token).await;
    let json = expect_status(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

/// More reference images than the cap is rejected with 400.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_too_many_references_rejected(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let app = build_test_app(pool);
    let token = auth_token(ALICE);

    let reference = serde_json::json!({ "kind": "inline", "data": "aGVsbG8=" });
    let body = serde_json::json!({
        "session_id": session_id,
        "model_id": TEST_MODEL,
        "prompt": "too many references",
        "params": { "reference_images": [reference, reference, reference, reference, reference] },
    });
    let response = post_json_auth(app, "/api/v1/generate", body, &token).await;
    expect_status(response, StatusCode::BAD_REQUEST).await;
}

/// An unregistered model id reads as 404, not a validation error.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_unknown_model(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let app = build_test_app(pool);
    let token = auth_token(ALICE);

    let body = serde_json::json!({
        "session_id": session_id,
        "model_id": "no-such-model",
        "prompt": "a lighthouse",
    });
    let response = post_json_auth(app, "/api/v1/generate", body, &token).await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}

/// Admission without a token returns 401.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_requires_auth(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let app = build_test_app(pool);

    let body = serde_json::json!({
        "session_id": session_id,
        "model_id": TEST_MODEL,
        "prompt": "a lighthouse",
    });
    let response = post_json(app, "/api/v1/generate", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Admitting into another user's session returns 403.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_create_foreign_session_forbidden(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let app = build_test_app(pool);
    let token = auth_token(BOB);

    let body = serde_json::json!({
        "session_id": session_id,
        "model_id": TEST_MODEL,
        "prompt": "a lighthouse",
    });
    let response = post_json_auth(app, "/api/v1/generate", body, &token).await;
    expect_status(response, StatusCode::FORBIDDEN).await;
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Listing returns only the caller's generations.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_list_is_scoped_to_caller(pool: PgPool) {
    let alice_session = create_session(&pool, ALICE).await;
    let bob_session = create_session(&pool, BOB).await;
    let alice = auth_token(ALICE);
    let bob = auth_token(BOB);

    let alice_id = admit(&pool, build_test_app(pool.clone()), alice_session, &alice).await;
    admit(&pool, build_test_app(pool.clone()), bob_session, &bob).await;

    let response = get_auth(build_test_app(pool), "/api/v1/generations", &alice).await;
    let json = expect_status(response, StatusCode::OK).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], alice_id);
}

/// Another user's generation reads as 404, not 403.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_get_foreign_generation_is_not_found(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let alice = auth_token(ALICE);
    let id = admit(&pool, build_test_app(pool.clone()), session_id, &alice).await;

    let bob = auth_token(BOB);
    let response = get_auth(build_test_app(pool), &format!("/api/v1/generations/{id}"), &bob).await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}

// ---------------------------------------------------------------------------
// Cancel / dismiss
// ---------------------------------------------------------------------------

/// Cancelling a processing generation succeeds; a second cancel is a 409.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_cancel_then_cancel_again(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let token = auth_token(ALICE);
    let id = admit(&pool, build_test_app(pool.clone()), session_id, &token).await;

    let response = put_auth(
        build_test_app(pool.clone()),
        &format!("/api/v1/generations/{id}/cancel"),
        &token,
    )
    .await;
    let json = expect_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["status"], "cancelled");

    let response = put_auth(
        build_test_app(pool),
        &format!("/api/v1/generations/{id}/cancel"),
        &token,
    )
    .await;
    expect_status(response, StatusCode::CONFLICT).await;
}

/// Dismissal is allowed from `failed`, and the row keeps its history.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_dismiss_failed_generation(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let token = auth_token(ALICE);
    let id = admit(&pool, build_test_app(pool.clone()), session_id, &token).await;

    let failed = GenerationRepo::fail_if_processing(&pool, id, "provider exploded", "upstream")
        .await
        .unwrap();
    assert!(failed);

    let response = patch_json_auth(
        build_test_app(pool.clone()),
        &format!("/api/v1/generations/{id}"),
        serde_json::json!({ "status": "dismissed" }),
        &token,
    )
    .await;
    let json = expect_status(response, StatusCode::OK).await;
    assert_eq!(json["data"]["status"], "dismissed");
    assert_eq!(json["data"]["error"]["message"], "provider exploded");

    let row = GenerationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(row.status_id, GenerationStatus::Dismissed.id());
}

/// Dismissal from a completed row is a 409; completed work is not hideable.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_dismiss_completed_generation_conflicts(pool: PgPool) {
    let session_id = create_session(&pool, ALICE).await;
    let token = auth_token(ALICE);
    let id = admit(&pool, build_test_app(pool.clone()), session_id, &token).await;

    assert!(GenerationRepo::complete_if_processing(&pool, id, 1).await.unwrap());

    let response = patch_json_auth(
        build_test_app(pool),
        &format!("/api/v1/generations/{id}"),
        serde_json::json!({ "status": "dismissed" }),
        &token,
    )
    .await;
    expect_status(response, StatusCode::CONFLICT).await;
}

/// The health endpoint reports the database state without auth.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_health_endpoint(pool: PgPool) {
    let app = build_test_app(pool);
    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
}
