//! Provider trait and exchange types.

use async_trait::async_trait;

use lumen_core::cost::{ComputeMetrics, ModelPricing};
use lumen_core::error::CoreError;
use lumen_core::params::UiParams;
use lumen_core::types::DbId;

/// Media kind of a produced artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Database string for the `outputs.media_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

/// Where the artifact bytes live after the provider call.
#[derive(Debug, Clone)]
pub enum OutputPayload {
    /// Raw bytes returned inline by the provider.
    Bytes(Vec<u8>),
    /// A provider-hosted URL that must be copied to durable storage.
    Url(String),
}

/// One artifact produced by a provider.
#[derive(Debug, Clone)]
pub struct ProviderOutput {
    pub payload: OutputPayload,
    pub media_type: MediaType,
    /// Dimensions as reported by the provider; absent values are derived
    /// downstream (byte sniff, then aspect-ratio defaults).
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_secs: Option<f64>,
}

/// A successful provider result.
#[derive(Debug, Clone, Default)]
pub struct ProviderSuccess {
    pub outputs: Vec<ProviderOutput>,
    pub metrics: Option<ComputeMetrics>,
}

/// What a provider call produced.
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    /// The provider finished synchronously.
    Completed(ProviderSuccess),
    /// The provider accepted the work and will call back via webhook with
    /// this correlation id.
    Accepted { correlation_id: String },
}

/// The request handed to a provider adapter.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub generation_id: DbId,
    pub model_id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    /// User-facing settings, with reference images hydrated to inline
    /// bytes when the adapter requires them.
    pub ui: UiParams,
}

/// A single AI generation backend for one model.
///
/// Adapters classify every failure into the [`CoreError`] taxonomy before
/// returning it; the executor persists that classification as-is.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The model identifier this adapter serves.
    fn model_id(&self) -> &str;

    /// Pricing used for cost computation when the provider reports no
    /// compute metrics.
    fn pricing(&self) -> ModelPricing {
        ModelPricing::default()
    }

    /// Whether reference images must be hydrated to inline bytes before
    /// the call (as opposed to passing blob URLs through).
    fn requires_inline_references(&self) -> bool {
        false
    }

    /// Run a generation. Slow: seconds to minutes.
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, CoreError>;
}
