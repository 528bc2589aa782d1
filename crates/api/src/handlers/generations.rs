//! Generation lifecycle handlers: admission, reads, cancel, dismiss.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use lumen_core::error::CoreError;
use lumen_core::params::{GenerationParams, ReferenceImage, UiParams, STEP_CREATE};
use lumen_core::signature::sha256_hex;
use lumen_core::types::{DbId, Timestamp};
use lumen_db::models::generation::{CreateGeneration, Generation, GenerationError};
use lumen_db::models::output::Output;
use lumen_db::models::status::GenerationStatus;
use lumen_db::repositories::{GenerationRepo, JobRepo, OutputRepo, SessionRepo};
use lumen_events::PipelineEvent;
use lumen_storage::reference_key;

use crate::config::QueueMode;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest accepted prompt, in characters.
const MAX_PROMPT_CHARS: usize = 4000;

/// Max reference images per request.
const MAX_REFERENCE_IMAGES: usize = 4;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Client-facing projection of a generation row.
///
/// Built exclusively from the typed params' client view, so trail markers
/// and provider correlation ids can never leak into a response.
#[derive(Debug, Serialize)]
pub struct GenerationView {
    pub id: DbId,
    pub session_id: DbId,
    pub model_id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub status: &'static str,
    pub params: UiParams,
    pub cost_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationError>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub outputs: Vec<Output>,
}

impl GenerationView {
    pub fn from_row(generation: Generation, outputs: Vec<Output>) -> Self {
        let status = GenerationStatus::from_id(generation.status_id)
            .map(GenerationStatus::as_str)
            .unwrap_or("unknown");
        let error = match (&generation.error_message, &generation.error_kind) {
            (Some(message), Some(kind)) => Some(GenerationError {
                message: message.clone(),
                kind: kind.clone(),
            }),
            _ => None,
        };
        let params = generation.parsed_params();
        Self {
            id: generation.id,
            session_id: generation.session_id,
            model_id: generation.model_id,
            prompt: generation.prompt,
            negative_prompt: generation.negative_prompt,
            status,
            params: params.client_view().clone(),
            cost_cents: generation.cost_cents,
            error,
            created_at: generation.created_at,
            updated_at: generation.updated_at,
            outputs,
        }
    }
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// Request body for `POST /generations`.
#[derive(Debug, Deserialize)]
pub struct CreateGenerationRequest {
    pub session_id: DbId,
    pub model_id: String,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub params: UiParams,
}

/// POST /api/v1/generate
///
/// Admit a generation: validate, persist the row in `processing`, and
/// hand it to the queue or the direct trigger pool. Responds as soon as
/// the work is durable; execution is asynchronous.
pub async fn create_generation(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateGenerationRequest>,
) -> AppResult<impl IntoResponse> {
    let prompt = input.prompt.trim();
    if prompt.is_empty() {
        return Err(CoreError::Validation("prompt must not be empty".into()).into());
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(CoreError::Validation(format!(
            "prompt exceeds {MAX_PROMPT_CHARS} characters"
        ))
        .into());
    }
    if input.params.reference_images.len() > MAX_REFERENCE_IMAGES {
        return Err(CoreError::Validation(format!(
            "at most {MAX_REFERENCE_IMAGES} reference images are allowed"
        ))
        .into());
    }
    if !state.pipeline.registry.contains(&input.model_id) {
        return Err(CoreError::not_found("Model", &input.model_id).into());
    }

    let session = SessionRepo::find_by_id(&state.pool, input.session_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Session", input.session_id))?;
    if session.user_id != user.user_id {
        return Err(CoreError::Forbidden("session belongs to another user".into()).into());
    }

    let ui = persist_reference_images(&state, input.params).await?;

    let mut params = GenerationParams {
        ui,
        ..Default::default()
    };
    params.push_step(STEP_CREATE, Utc::now());

    let generation = GenerationRepo::create(
        &state.pool,
        &CreateGeneration {
            session_id: session.id,
            user_id: user.user_id,
            model_id: input.model_id,
            prompt: prompt.to_string(),
            negative_prompt: input.negative_prompt,
            params,
        },
    )
    .await?;

    state.event_bus.publish(
        PipelineEvent::new("generation.created", generation.id).with_user(user.user_id),
    );

    match state.config.queue_mode {
        QueueMode::Queue => {
            JobRepo::enqueue(&state.pool, generation.id).await?;
            tracing::info!(
                generation_id = generation.id,
                user_id = user.user_id,
                "Generation admitted and enqueued",
            );
        }
        QueueMode::Direct => {
            state.triggers.dispatch(generation.id);
            tracing::info!(
                generation_id = generation.id,
                user_id = user.user_id,
                "Generation admitted and dispatched",
            );
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: GenerationView::from_row(generation, Vec::new()),
        }),
    ))
}

/// Replace inline reference images with durable blob-store pointers so
/// the generation row stays small and its params are safe to echo back.
async fn persist_reference_images(
    state: &AppState,
    mut ui: UiParams,
) -> Result<UiParams, AppError> {
    for reference in &mut ui.reference_images {
        if let ReferenceImage::Inline { .. } = reference {
            let bytes = reference.decode_inline().map_err(AppError::Core)?;
            if bytes.is_empty() {
                return Err(CoreError::Validation("reference image is empty".into()).into());
            }
            let checksum = sha256_hex(&bytes);
            let url = state
                .pipeline
                .storage
                .put(&reference_key(&checksum), bytes, "application/octet-stream")
                .await?;
            *reference = ReferenceImage::Stored { url, checksum };
        }
    }
    Ok(ui)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Query parameters for generation listing.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// GET /api/v1/generations
///
/// List the caller's generations, newest first.
pub async fn list_generations(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let rows =
        GenerationRepo::list_by_user(&state.pool, user.user_id, query.limit, query.offset).await?;

    let mut views = Vec::with_capacity(rows.len());
    for generation in rows {
        let outputs = OutputRepo::list_for_generation(&state.pool, generation.id).await?;
        views.push(GenerationView::from_row(generation, outputs));
    }

    Ok(Json(DataResponse { data: views }))
}

/// GET /api/v1/generations/{id}
pub async fn get_generation(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let generation = find_owned(&state, &user, id).await?;
    let outputs = OutputRepo::list_for_generation(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: GenerationView::from_row(generation, outputs),
    }))
}

// ---------------------------------------------------------------------------
// Cancel / dismiss
// ---------------------------------------------------------------------------

/// PUT /api/v1/generations/{id}/cancel
///
/// Cancel a processing generation. The conditional update means a late
/// executor or webhook result arriving after this point is discarded.
pub async fn cancel_generation(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let generation = find_owned(&state, &user, id).await?;

    if !GenerationRepo::cancel_if_processing(&state.pool, id).await? {
        return Err(AppError::Conflict(format!(
            "generation {id} is already terminal"
        )));
    }

    tracing::info!(generation_id = id, user_id = user.user_id, "Generation cancelled");
    state.event_bus.publish(
        PipelineEvent::new("generation.cancelled", id).with_user(user.user_id),
    );

    let outputs = OutputRepo::list_for_generation(&state.pool, id).await?;
    let row = GenerationRepo::find_by_id(&state.pool, id)
        .await?
        .unwrap_or(generation);
    Ok(Json(DataResponse {
        data: GenerationView::from_row(row, outputs),
    }))
}

/// Request body for `PATCH /generations/{id}`. Dismissal is the only
/// supported status edit.
#[derive(Debug, Deserialize)]
pub struct UpdateGenerationRequest {
    pub status: String,
}

/// PATCH /api/v1/generations/{id}
///
/// With `{status: "dismissed"}`: hide a stuck or failed generation from
/// the UI without deleting its history. Allowed from `processing` and
/// `failed` only.
pub async fn dismiss_generation(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateGenerationRequest>,
) -> AppResult<impl IntoResponse> {
    if input.status != "dismissed" {
        return Err(CoreError::Validation(format!(
            "unsupported status update '{}', only 'dismissed' is allowed",
            input.status
        ))
        .into());
    }

    find_owned(&state, &user, id).await?;

    if !GenerationRepo::dismiss(&state.pool, id).await? {
        return Err(AppError::Conflict(format!(
            "generation {id} cannot be dismissed from its current status"
        )));
    }

    tracing::info!(generation_id = id, user_id = user.user_id, "Generation dismissed");

    let row = GenerationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Generation", id))?;
    let outputs = OutputRepo::list_for_generation(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: GenerationView::from_row(row, outputs),
    }))
}

/// Fetch a generation the caller owns. Rows owned by other users read as
/// not found rather than forbidden, to avoid confirming their existence.
async fn find_owned(
    state: &AppState,
    user: &AuthUser,
    id: DbId,
) -> Result<Generation, AppError> {
    let generation = GenerationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Generation", id))?;
    if generation.user_id != user.user_id {
        return Err(CoreError::not_found("Generation", id).into());
    }
    Ok(generation)
}
