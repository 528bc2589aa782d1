pub mod health;

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generate                         admit a generation (POST, auth)
/// /generate/process                 run executor / drain queue (POST,
///                                   internal secret or auth)
///
/// /generations                      list (GET, auth)
/// /generations/{id}                 get (GET), dismiss (PATCH)
/// /generations/{id}/cancel          cancel (PUT)
///
/// /outputs/{id}/star                star / unstar (POST)
///
/// /webhooks/provider                provider completion callback (signed)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(handlers::generations::create_generation))
        .route("/generate/process", post(handlers::process::process))
        .route("/generations", get(handlers::generations::list_generations))
        .route(
            "/generations/{id}",
            get(handlers::generations::get_generation)
                .patch(handlers::generations::dismiss_generation),
        )
        .route(
            "/generations/{id}/cancel",
            put(handlers::generations::cancel_generation),
        )
        .route("/outputs/{id}/star", post(handlers::outputs::star_output))
        .route(
            "/webhooks/provider",
            post(handlers::webhooks::provider_callback),
        )
}
