//! Generic HTTP provider adapter.
//!
//! Speaks a plain JSON contract: `POST {base_url}/v1/generate` with the
//! prompt and settings, answered either synchronously with outputs or
//! with `"accepted"` plus a correlation id for a later webhook callback.
//! No specific vendor API is reproduced; per-vendor differences belong in
//! their own adapters behind the same trait.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use lumen_core::cost::{ComputeMetrics, ModelPricing};
use lumen_core::error::CoreError;

use crate::adapter::{
    MediaType, OutputPayload, Provider, ProviderOutput, ProviderRequest, ProviderResponse,
    ProviderSuccess,
};

/// Adapter for one model served over the generic HTTP contract.
pub struct HttpProvider {
    model_id: String,
    base_url: String,
    client: reqwest::Client,
    pricing: ModelPricing,
    inline_references: bool,
}

impl HttpProvider {
    pub fn new(model_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            pricing: ModelPricing::default(),
            inline_references: false,
        }
    }

    /// Override the default pricing for this model.
    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Require reference images to be hydrated to inline bytes.
    pub fn with_inline_references(mut self) -> Self {
        self.inline_references = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    #[serde(flatten)]
    settings: &'a lumen_core::params::UiParams,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    status: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    outputs: Vec<WireOutput>,
    #[serde(default)]
    metrics: Option<ComputeMetrics>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireOutput {
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
struct WireError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

fn default_media_type() -> String {
    "image".to_string()
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Map a provider HTTP status to the error taxonomy.
pub fn classify_status(status: StatusCode, message: &str) -> CoreError {
    match status.as_u16() {
        422 => CoreError::ContentSafety(message.to_string()),
        429 => CoreError::RateLimited(message.to_string()),
        400..=499 => CoreError::Validation(message.to_string()),
        500..=599 => CoreError::UpstreamUnavailable(message.to_string()),
        _ => CoreError::Internal(message.to_string()),
    }
}

/// Map an error code string from a provider payload to the taxonomy.
pub fn classify_code(code: Option<&str>, message: &str) -> CoreError {
    match code {
        Some("content_safety") => CoreError::ContentSafety(message.to_string()),
        Some("rate_limited") => CoreError::RateLimited(message.to_string()),
        Some("validation") => CoreError::Validation(message.to_string()),
        Some("unavailable") | Some("timeout") => {
            CoreError::UpstreamUnavailable(message.to_string())
        }
        _ => CoreError::Internal(message.to_string()),
    }
}

fn classify_transport(err: reqwest::Error) -> CoreError {
    if err.is_timeout() || err.is_connect() {
        CoreError::UpstreamUnavailable(format!("provider unreachable: {err}"))
    } else if let Some(status) = err.status() {
        classify_status(status, &err.to_string())
    } else {
        CoreError::UpstreamUnavailable(format!("provider transport error: {err}"))
    }
}

fn wire_media_type(s: &str) -> MediaType {
    if s.eq_ignore_ascii_case("video") {
        MediaType::Video
    } else {
        MediaType::Image
    }
}

// ---------------------------------------------------------------------------
// Provider impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Provider for HttpProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn pricing(&self) -> ModelPricing {
        self.pricing
    }

    fn requires_inline_references(&self) -> bool {
        self.inline_references
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, CoreError> {
        let url = format!("{}/v1/generate", self.base_url.trim_end_matches('/'));
        let body = WireRequest {
            model: &self.model_id,
            prompt: &request.prompt,
            negative_prompt: request.negative_prompt.as_deref(),
            settings: &request.ui,
        };

        tracing::debug!(
            generation_id = request.generation_id,
            model_id = %self.model_id,
            "Submitting generation to provider",
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &message));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| CoreError::UpstreamUnavailable(format!("malformed provider response: {e}")))?;

        parse_wire_response(wire)
    }
}

/// Interpret a decoded provider response body.
fn parse_wire_response(wire: WireResponse) -> Result<ProviderResponse, CoreError> {
    match wire.status.as_str() {
        "succeeded" => {
            let outputs = wire
                .outputs
                .into_iter()
                .map(|o| ProviderOutput {
                    payload: OutputPayload::Url(o.url),
                    media_type: wire_media_type(&o.media_type),
                    width: o.width,
                    height: o.height,
                    duration_secs: o.duration_secs,
                })
                .collect();
            Ok(ProviderResponse::Completed(ProviderSuccess {
                outputs,
                metrics: wire.metrics,
            }))
        }
        "accepted" => {
            let correlation_id = wire.id.ok_or_else(|| {
                CoreError::UpstreamUnavailable(
                    "provider accepted the request without a correlation id".into(),
                )
            })?;
            Ok(ProviderResponse::Accepted { correlation_id })
        }
        "failed" => {
            let (message, code) = wire
                .error
                .map(|e| (e.message, e.code))
                .unwrap_or_else(|| ("provider reported failure".to_string(), None));
            Err(classify_code(code.as_deref(), &message))
        }
        other => Err(CoreError::Internal(format!(
            "unknown provider status '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_covers_taxonomy() {
        assert_eq!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "nsfw").kind(),
            "content_safety"
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down").kind(),
            "rate_limited"
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, "bad").kind(),
            "validation"
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, "down").kind(),
            "upstream_unavailable"
        );
    }

    #[test]
    fn succeeded_body_parses_to_outputs() {
        let wire: WireResponse = serde_json::from_str(
            r#"{
                "status": "succeeded",
                "outputs": [
                    {"url": "https://cdn.example/out0.png", "width": 1024, "height": 576},
                    {"url": "https://cdn.example/out1.mp4", "media_type": "video", "duration_secs": 4.0}
                ],
                "metrics": {"compute_seconds": 11.5}
            }"#,
        )
        .unwrap();

        let response = parse_wire_response(wire).unwrap();
        match response {
            ProviderResponse::Completed(success) => {
                assert_eq!(success.outputs.len(), 2);
                assert_eq!(success.outputs[0].media_type, MediaType::Image);
                assert_eq!(success.outputs[1].media_type, MediaType::Video);
                assert_eq!(success.metrics.unwrap().compute_seconds, Some(11.5));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn accepted_body_carries_correlation_id() {
        let wire: WireResponse =
            serde_json::from_str(r#"{"status": "accepted", "id": "prov-xyz"}"#).unwrap();
        match parse_wire_response(wire).unwrap() {
            ProviderResponse::Accepted { correlation_id } => {
                assert_eq!(correlation_id, "prov-xyz");
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    #[test]
    fn accepted_without_id_is_an_upstream_error() {
        let wire: WireResponse = serde_json::from_str(r#"{"status": "accepted"}"#).unwrap();
        assert_eq!(
            parse_wire_response(wire).unwrap_err().kind(),
            "upstream_unavailable"
        );
    }

    #[test]
    fn failed_body_maps_error_code() {
        let wire: WireResponse = serde_json::from_str(
            r#"{"status": "failed", "error": {"message": "prompt rejected", "code": "content_safety"}}"#,
        )
        .unwrap();
        let err = parse_wire_response(wire).unwrap_err();
        assert_eq!(err.kind(), "content_safety");
        assert!(!err.retryable());
    }
}
