//! Provider webhook completion path.
//!
//! Asynchronous providers finish generations by calling back with a
//! signed payload. The handler verifies the HMAC signature over
//! `"{timestamp}.{body}"`, resolves the generation by correlation id,
//! and runs the same completion routine as the executor. Every verified
//! callback is acknowledged with 200, including unmatched,
//! already-terminal, and malformed ones, so providers stop redelivering
//! payloads we cannot use; only a signature failure is rejected.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use lumen_core::cost::ComputeMetrics;
use lumen_core::error::CoreError;
use lumen_core::signature::verify;
use lumen_pipeline::complete::{complete_generation, fail_generation};
use lumen_pipeline::ExecuteOutcome;
use lumen_providers::http::classify_code;
use lumen_providers::{MediaType, OutputPayload, ProviderOutput, ProviderSuccess};

use lumen_db::repositories::GenerationRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Header carrying the Unix timestamp the signature was computed over.
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Header carrying the hex HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    /// Provider correlation id assigned when the work was accepted.
    id: String,
    /// `"succeeded"`, `"failed"`, or `"cancelled"`.
    status: String,
    #[serde(default)]
    outputs: Vec<WebhookOutput>,
    #[serde(default)]
    metrics: Option<ComputeMetrics>,
    #[serde(default)]
    error: Option<WebhookError>,
}

#[derive(Debug, Deserialize)]
struct WebhookOutput {
    url: String,
    #[serde(default = "default_media_type")]
    media_type: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WebhookError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

fn default_media_type() -> String {
    "image".to_string()
}

/// Acknowledgement body. `matched: false` means the correlation id did
/// not resolve; the callback is still acknowledged.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /api/v1/webhooks/provider
pub async fn provider_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let Ok(body_str) = std::str::from_utf8(&body) else {
        tracing::warn!("Discarding webhook with non-UTF-8 body");
        return Ok(ack(false, None));
    };

    // No configured secret means verification is skipped entirely, the
    // documented weaker-security mode.
    if let Some(secret) = state.config.webhook_secret.as_deref() {
        let timestamp: i64 = headers
            .get(TIMESTAMP_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| CoreError::Auth("missing or malformed signature timestamp".into()))?;
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CoreError::Auth("missing webhook signature".into()))?;

        verify(secret, timestamp, body_str, signature, Utc::now())?;
    }

    // Past signature verification everything answers 200; erroring here
    // would only make the provider redeliver a payload we cannot use.
    let payload: WebhookPayload = match serde_json::from_str(body_str) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding malformed webhook payload");
            return Ok(ack(false, None));
        }
    };

    let Some(generation) = GenerationRepo::find_by_correlation(&state.pool, &payload.id).await?
    else {
        tracing::info!(correlation_id = %payload.id, "Webhook for unknown correlation id");
        return Ok(ack(false, None));
    };

    // Same guard as the executor: a terminal row is settled, and a replay
    // must not re-download artifacts (the provider URLs may be long gone).
    if generation.is_terminal() {
        return Ok(ack(true, Some(outcome_label(&ExecuteOutcome::Skipped))));
    }

    let outcome = match payload.status.as_str() {
        "succeeded" => {
            let success = ProviderSuccess {
                outputs: payload.outputs.into_iter().map(into_provider_output).collect(),
                metrics: payload.metrics,
            };
            complete_generation(&state.pipeline, &generation, success).await?
        }
        // Provider-side cancellation lands on the row as a failure too;
        // user-side cancellation already made the row terminal.
        "failed" | "cancelled" => {
            let (message, code) = payload
                .error
                .map(|e| (e.message, e.code))
                .unwrap_or_else(|| ("provider reported failure".to_string(), None));
            let error = classify_code(code.as_deref(), &message);
            fail_generation(&state.pipeline, &generation, error).await?
        }
        other => {
            tracing::warn!(
                generation_id = generation.id,
                status = other,
                "Discarding webhook with unknown status"
            );
            return Ok(ack(true, None));
        }
    };

    tracing::info!(
        generation_id = generation.id,
        correlation_id = %payload.id,
        outcome = outcome_label(&outcome),
        "Webhook processed",
    );

    Ok(ack(true, Some(outcome_label(&outcome))))
}

fn ack(matched: bool, outcome: Option<&'static str>) -> Json<DataResponse<WebhookAck>> {
    Json(DataResponse {
        data: WebhookAck {
            received: true,
            matched,
            outcome,
        },
    })
}

fn into_provider_output(output: WebhookOutput) -> ProviderOutput {
    let media_type = if output.media_type.eq_ignore_ascii_case("video") {
        MediaType::Video
    } else {
        MediaType::Image
    };
    ProviderOutput {
        payload: OutputPayload::Url(output.url),
        media_type,
        width: output.width,
        height: output.height,
        duration_secs: output.duration_secs,
    }
}

fn outcome_label(outcome: &ExecuteOutcome) -> &'static str {
    match outcome {
        ExecuteOutcome::Completed { .. } => "completed",
        ExecuteOutcome::Accepted => "accepted",
        ExecuteOutcome::Failed { .. } => "failed",
        ExecuteOutcome::Skipped => "skipped",
    }
}
