//! Shared completion routine.
//!
//! Both completion paths land here: the executor after a synchronous
//! provider result, and the webhook handler after an asynchronous
//! callback. Artifacts are persisted to blob storage first (idempotent
//! per key), then a single conditional update decides the winner; output
//! rows are inserted only after winning, so a generation ends up with
//! exactly one set of outputs no matter how many paths race.

use std::io::Cursor;

use lumen_core::cost::cost_cents;
use lumen_core::error::CoreError;
use lumen_core::params::{default_dimensions, UiParams};
use lumen_db::models::generation::Generation;
use lumen_db::models::output::CreateOutput;
use lumen_db::repositories::{GenerationRepo, OutputRepo};
use lumen_events::PipelineEvent;
use lumen_providers::{MediaType, OutputPayload, Provider, ProviderOutput, ProviderSuccess};
use lumen_storage::output_key;

use crate::executor::ExecuteOutcome;
use crate::{db_error, PipelineContext};

/// Drive a generation to `completed` from a provider success.
///
/// Safe to call more than once for the same generation: storage writes
/// overwrite in place and only the conditional-update winner inserts
/// output rows. Returns [`ExecuteOutcome::Skipped`] when another path
/// already finished the row.
pub async fn complete_generation(
    ctx: &PipelineContext,
    generation: &Generation,
    success: ProviderSuccess,
) -> Result<ExecuteOutcome, CoreError> {
    if success.outputs.is_empty() {
        let error = CoreError::UpstreamUnavailable(
            "provider reported success with no outputs".into(),
        );
        return fail_generation(ctx, generation, error).await;
    }

    let ui = generation.parsed_params().ui;
    let mut rows = Vec::with_capacity(success.outputs.len());
    for (index, output) in success.outputs.iter().enumerate() {
        let bytes = materialize(output).await?;
        let (width, height) = resolve_dimensions(output, &bytes, &ui);
        let (extension, content_type) = match output.media_type {
            MediaType::Image => ("png", "image/png"),
            MediaType::Video => ("mp4", "video/mp4"),
        };
        let key = output_key(generation.id, index, extension);
        let file_url = ctx.storage.put(&key, bytes, content_type).await?;
        rows.push(CreateOutput {
            file_url,
            media_type: output.media_type.as_str().to_string(),
            width,
            height,
            duration_secs: output.duration_secs,
        });
    }

    let pricing = ctx
        .registry
        .resolve(&generation.model_id)
        .map(|p| p.pricing())
        .unwrap_or_default();
    let cost = cost_cents(success.metrics.as_ref(), &pricing, rows.len());

    let won = GenerationRepo::complete_if_processing(&ctx.pool, generation.id, cost)
        .await
        .map_err(db_error)?;
    if !won {
        tracing::info!(
            generation_id = generation.id,
            "Completion lost the status race, row already terminal"
        );
        return Ok(ExecuteOutcome::Skipped);
    }

    let created = OutputRepo::create_many(&ctx.pool, generation.id, &rows)
        .await
        .map_err(db_error)?;

    tracing::info!(
        generation_id = generation.id,
        output_count = created.len(),
        cost_cents = cost,
        "Generation completed"
    );
    ctx.events.publish(
        PipelineEvent::new("generation.completed", generation.id)
            .with_user(generation.user_id)
            .with_payload(serde_json::json!({
                "output_count": created.len(),
                "cost_cents": cost,
            })),
    );

    Ok(ExecuteOutcome::Completed {
        output_count: created.len(),
    })
}

/// Drive a generation to `failed` with classified error context.
///
/// Loses gracefully: if the row is already terminal the error is dropped
/// and the caller sees [`ExecuteOutcome::Skipped`].
pub async fn fail_generation(
    ctx: &PipelineContext,
    generation: &Generation,
    error: CoreError,
) -> Result<ExecuteOutcome, CoreError> {
    let marked = GenerationRepo::fail_if_processing(
        &ctx.pool,
        generation.id,
        &error.to_string(),
        error.kind(),
    )
    .await
    .map_err(db_error)?;
    if !marked {
        return Ok(ExecuteOutcome::Skipped);
    }

    tracing::warn!(
        generation_id = generation.id,
        error_kind = error.kind(),
        error = %error,
        "Generation failed"
    );
    ctx.events.publish(
        PipelineEvent::new("generation.failed", generation.id)
            .with_user(generation.user_id)
            .with_payload(serde_json::json!({
                "error_kind": error.kind(),
                "error_message": error.to_string(),
            })),
    );

    Ok(ExecuteOutcome::Failed { error })
}

/// Fetch artifact bytes, downloading provider-hosted URLs so every output
/// ends up in our own durable storage.
async fn materialize(output: &ProviderOutput) -> Result<Vec<u8>, CoreError> {
    match &output.payload {
        OutputPayload::Bytes(bytes) => Ok(bytes.clone()),
        OutputPayload::Url(url) => {
            let response = reqwest::get(url).await.map_err(|e| {
                CoreError::UpstreamUnavailable(format!("output download failed: {e}"))
            })?;
            if !response.status().is_success() {
                return Err(CoreError::UpstreamUnavailable(format!(
                    "output download returned {} for {url}",
                    response.status()
                )));
            }
            let bytes = response.bytes().await.map_err(|e| {
                CoreError::UpstreamUnavailable(format!("output download failed: {e}"))
            })?;
            Ok(bytes.to_vec())
        }
    }
}

/// Dimensions in priority order: provider-reported, sniffed from image
/// bytes, then aspect-ratio defaults.
fn resolve_dimensions(output: &ProviderOutput, bytes: &[u8], ui: &UiParams) -> (i32, i32) {
    if let (Some(w), Some(h)) = (output.width, output.height) {
        return (w as i32, h as i32);
    }
    if output.media_type == MediaType::Image {
        if let Some((w, h)) = sniff_image_dimensions(bytes) {
            return (w as i32, h as i32);
        }
    }
    let (w, h) = default_dimensions(ui.aspect_ratio.as_deref());
    (w as i32, h as i32)
}

fn sniff_image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
