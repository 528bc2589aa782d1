use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `"ok"` when the database answers, `"degraded"` otherwise.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
}

/// GET /health: liveness plus a database ping, no auth.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = lumen_db::health_check(&state.pool).await.is_ok();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
    })
}

/// Mounted at the root, outside the `/api/v1` nest.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
