//! Processing trigger.
//!
//! `POST /generate/process` lets trusted callers (schedulers, operator
//! tooling, queue drains during deploys) push work through the executor
//! over HTTP. With a generation id it runs that one generation inline;
//! without one it claims and processes a single queue batch.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use lumen_core::error::CoreError;
use lumen_core::types::DbId;
use lumen_db::repositories::{GenerationRepo, JobRepo};
use lumen_pipeline::{execute, ExecuteOutcome};

use crate::error::AppResult;
use crate::middleware::ProcessCaller;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /generate/process`.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    /// Run this generation directly instead of draining the queue.
    #[serde(default)]
    pub generation_id: Option<DbId>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    /// Jobs claimed in this drain (1 for a direct invocation).
    pub claimed: usize,
    /// Executor outcome per processed generation.
    pub outcomes: Vec<ProcessedGeneration>,
}

#[derive(Debug, Serialize)]
pub struct ProcessedGeneration {
    pub generation_id: DbId,
    pub outcome: &'static str,
}

fn outcome_label(outcome: &ExecuteOutcome) -> &'static str {
    match outcome {
        ExecuteOutcome::Completed { .. } => "completed",
        ExecuteOutcome::Accepted => "accepted",
        ExecuteOutcome::Failed { .. } => "failed",
        ExecuteOutcome::Skipped => "skipped",
    }
}

/// POST /api/v1/generate/process
pub async fn process(
    _caller: ProcessCaller,
    State(state): State<AppState>,
    body: Option<Json<ProcessRequest>>,
) -> AppResult<impl IntoResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let response = match request.generation_id {
        Some(generation_id) => run_one(&state, generation_id).await?,
        None => drain_batch(&state).await?,
    };

    Ok(Json(DataResponse { data: response }))
}

/// Execute a single generation inline and report the outcome.
async fn run_one(state: &AppState, generation_id: DbId) -> AppResult<ProcessResponse> {
    GenerationRepo::find_by_id(&state.pool, generation_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Generation", generation_id))?;

    let outcome = execute(&state.pipeline, generation_id).await?;
    Ok(ProcessResponse {
        claimed: 1,
        outcomes: vec![ProcessedGeneration {
            generation_id,
            outcome: outcome_label(&outcome),
        }],
    })
}

/// Claim one queue batch and process it, resolving each job the same way
/// the standalone worker does.
async fn drain_batch(state: &AppState) -> AppResult<ProcessResponse> {
    let jobs = JobRepo::claim(
        &state.pool,
        state.config.queue_batch_size,
        state.config.job_lock_timeout_secs,
    )
    .await?;

    let mut outcomes = Vec::with_capacity(jobs.len());
    for job in jobs {
        match execute(&state.pipeline, job.generation_id).await {
            Ok(outcome) => {
                outcomes.push(ProcessedGeneration {
                    generation_id: job.generation_id,
                    outcome: outcome_label(&outcome),
                });
                if let Err(e) = JobRepo::delete(&state.pool, job.id).await {
                    tracing::warn!(job_id = job.id, error = %e, "Could not delete finished job");
                }
            }
            Err(error) => {
                tracing::warn!(
                    job_id = job.id,
                    generation_id = job.generation_id,
                    error = %error,
                    "Job failed during drain, releasing for retry",
                );
                outcomes.push(ProcessedGeneration {
                    generation_id: job.generation_id,
                    outcome: "retrying",
                });
                if let Err(e) = JobRepo::release_for_retry(
                    &state.pool,
                    job.id,
                    state.config.job_retry_delay_secs,
                )
                .await
                {
                    tracing::warn!(job_id = job.id, error = %e, "Could not release failed job");
                }
            }
        }
    }

    Ok(ProcessResponse {
        claimed: outcomes.len(),
        outcomes,
    })
}
