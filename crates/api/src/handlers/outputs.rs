//! Output handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use lumen_core::error::CoreError;
use lumen_core::types::DbId;
use lumen_db::repositories::{GenerationRepo, OutputRepo};

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /outputs/{id}/star`.
#[derive(Debug, Deserialize)]
pub struct StarRequest {
    pub starred: bool,
}

/// POST /api/v1/outputs/{id}/star
///
/// Set or clear the starred flag on one of the caller's outputs.
pub async fn star_output(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<StarRequest>,
) -> AppResult<impl IntoResponse> {
    let output = OutputRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Output", id))?;

    // Ownership flows through the parent generation.
    let owned = GenerationRepo::find_by_id(&state.pool, output.generation_id)
        .await?
        .is_some_and(|g| g.user_id == user.user_id);
    if !owned {
        return Err(CoreError::not_found("Output", id).into());
    }

    let updated = OutputRepo::set_starred(&state.pool, id, input.starred)
        .await?
        .ok_or_else(|| CoreError::not_found("Output", id))?;

    Ok(Json(DataResponse { data: updated }))
}
