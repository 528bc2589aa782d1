//! Generation executor.
//!
//! One invocation drives one generation against its provider adapter.
//! Invocations are stateless and safe to duplicate: a terminal-status
//! guard up front skips rows another path already finished, and every
//! transition out of `processing` is a conditional update, so the queue
//! may hand the same generation to two workers without producing two
//! results.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use lumen_core::error::CoreError;
use lumen_core::params::{ReferenceImage, STEP_ACCEPTED, STEP_HEARTBEAT};
use lumen_core::types::DbId;
use lumen_db::models::generation::Generation;
use lumen_db::models::status::is_terminal;
use lumen_db::repositories::GenerationRepo;
use lumen_db::DbPool;
use lumen_providers::{Provider, ProviderRequest, ProviderResponse};

use crate::complete::{complete_generation, fail_generation};
use crate::{db_error, PipelineContext};

/// How often the executor stamps `last_heartbeat_at` while a provider
/// call is in flight. The stuck sweep treats anything staler than its
/// own threshold as a stalled executor.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// What one executor invocation did.
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// The generation completed and outputs were persisted.
    Completed { output_count: usize },
    /// The provider accepted the work; a webhook will finish it.
    Accepted,
    /// The generation was marked failed with this classified error.
    Failed { error: CoreError },
    /// Nothing to do: row missing, already terminal, or another path won.
    Skipped,
}

/// Execute a generation end to end.
///
/// Provider failures are absorbed into the row (`Ok(Failed { .. })`).
/// An `Err` means infrastructure trouble (the database, storage); the
/// row is marked failed when that is still possible, and the error is
/// surfaced so queue-mode callers can schedule a retry.
pub async fn execute(
    ctx: &PipelineContext,
    generation_id: DbId,
) -> Result<ExecuteOutcome, CoreError> {
    match run(ctx, generation_id).await {
        Ok(outcome) => Ok(outcome),
        Err(error) => {
            tracing::error!(generation_id, %error, "Executor failed");
            // Best effort: if the database is reachable, do not leave the
            // row in processing. If it is not, the queue retry or the
            // stuck sweep picks the row up later.
            if let Ok(true) = GenerationRepo::fail_if_processing(
                &ctx.pool,
                generation_id,
                &error.to_string(),
                error.kind(),
            )
            .await
            {
                ctx.events.publish(
                    lumen_events::PipelineEvent::new("generation.failed", generation_id)
                        .with_payload(serde_json::json!({
                            "error_kind": error.kind(),
                            "error_message": error.to_string(),
                        })),
                );
            }
            Err(error)
        }
    }
}

async fn run(ctx: &PipelineContext, generation_id: DbId) -> Result<ExecuteOutcome, CoreError> {
    let Some(generation) = GenerationRepo::find_by_id(&ctx.pool, generation_id)
        .await
        .map_err(db_error)?
    else {
        tracing::warn!(generation_id, "Executor invoked for missing generation");
        return Ok(ExecuteOutcome::Skipped);
    };

    if generation.is_terminal() {
        tracing::debug!(generation_id, status_id = generation.status_id, "Already terminal");
        return Ok(ExecuteOutcome::Skipped);
    }

    let Some(provider) = ctx.registry.resolve(&generation.model_id) else {
        let error = CoreError::not_found("Model", &generation.model_id);
        return fail_generation(ctx, &generation, error).await;
    };

    let request = build_request(ctx, &generation, provider.requires_inline_references()).await?;

    tracing::info!(
        generation_id,
        model_id = %generation.model_id,
        "Calling provider"
    );
    let heartbeat = Heartbeat::start(ctx.pool.clone(), generation_id);
    let result = provider.generate(&request).await;
    heartbeat.stop().await;

    match result {
        Ok(ProviderResponse::Accepted { correlation_id }) => {
            record_acceptance(ctx, generation_id, correlation_id).await?;
            Ok(ExecuteOutcome::Accepted)
        }
        Ok(ProviderResponse::Completed(success)) => {
            // A cancel may have landed while the provider was working.
            // The conditional update would catch it anyway, but checking
            // here skips the storage uploads for a row nobody wants.
            match GenerationRepo::status(&ctx.pool, generation_id)
                .await
                .map_err(db_error)?
            {
                Some(status) if !is_terminal(status) => {
                    complete_generation(ctx, &generation, success).await
                }
                _ => {
                    tracing::info!(generation_id, "Discarding provider result, row terminal");
                    Ok(ExecuteOutcome::Skipped)
                }
            }
        }
        Err(error) => fail_generation(ctx, &generation, error).await,
    }
}

/// Build the provider request, hydrating stored reference pointers back
/// to inline bytes when the adapter needs them.
async fn build_request(
    ctx: &PipelineContext,
    generation: &Generation,
    inline_references: bool,
) -> Result<ProviderRequest, CoreError> {
    let mut ui = generation.parsed_params().ui;
    if inline_references {
        for reference in &mut ui.reference_images {
            if let ReferenceImage::Stored { url, .. } = reference {
                let bytes = ctx.storage.get(url).await?;
                *reference = ReferenceImage::inline_from_bytes(&bytes);
            }
        }
    }
    Ok(ProviderRequest {
        generation_id: generation.id,
        model_id: generation.model_id.clone(),
        prompt: generation.prompt.clone(),
        negative_prompt: generation.negative_prompt.clone(),
        ui,
    })
}

/// Store the provider correlation id so the webhook path can resolve the
/// row, and leave the generation in `processing` for the callback.
async fn record_acceptance(
    ctx: &PipelineContext,
    generation_id: DbId,
    correlation_id: String,
) -> Result<(), CoreError> {
    let Some(generation) = GenerationRepo::find_by_id(&ctx.pool, generation_id)
        .await
        .map_err(db_error)?
    else {
        return Ok(());
    };
    let mut params = generation.parsed_params();
    params.provider_correlation = Some(correlation_id.clone());
    params.push_step(STEP_ACCEPTED, Utc::now());
    let value =
        serde_json::to_value(&params).map_err(|e| CoreError::Internal(e.to_string()))?;
    GenerationRepo::set_params(&ctx.pool, generation_id, &value)
        .await
        .map_err(db_error)?;
    tracing::info!(generation_id, correlation_id, "Provider accepted, awaiting webhook");
    Ok(())
}

/// Append a heartbeat trail marker and stamp `last_heartbeat_at`.
///
/// Re-reads the row each time so markers written by other paths survive,
/// and stops touching rows that went terminal mid-flight.
pub async fn write_heartbeat(pool: &DbPool, generation_id: DbId) -> Result<(), sqlx::Error> {
    let Some(generation) = GenerationRepo::find_by_id(pool, generation_id).await? else {
        return Ok(());
    };
    if generation.is_terminal() {
        return Ok(());
    }
    let mut params = generation.parsed_params();
    params.push_step(STEP_HEARTBEAT, Utc::now());
    let value = serde_json::to_value(&params).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    GenerationRepo::record_heartbeat(pool, generation_id, &value).await
}

/// Background liveness writer running for the duration of one provider
/// call. Write failures are logged and swallowed; a missed heartbeat
/// must never abort a generation in flight.
struct Heartbeat {
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl Heartbeat {
    fn start(pool: DbPool, generation_id: DbId) -> Self {
        let token = CancellationToken::new();
        let child = token.child_token();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                        if let Err(error) = write_heartbeat(&pool, generation_id).await {
                            tracing::warn!(generation_id, %error, "Heartbeat write failed");
                        }
                    }
                }
            }
        });
        Self { token, handle }
    }

    async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}
