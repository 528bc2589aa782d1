//! Deterministic in-process adapter.
//!
//! Serves two purposes: the `demo-image` model for local development
//! without a real provider, and a controllable double for pipeline tests
//! (scripted results, call counting, optional latency).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use lumen_core::cost::{ComputeMetrics, ModelPricing};
use lumen_core::error::CoreError;

use crate::adapter::{
    MediaType, OutputPayload, Provider, ProviderOutput, ProviderRequest, ProviderResponse,
    ProviderSuccess,
};

/// 1x1 transparent PNG. Enough for the dimension sniffer to parse.
const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

enum Script {
    Completed { output_count: usize },
    Accepted { correlation_id: String },
    Fail(CoreError),
    /// Scripted sequence consumed one entry per call; repeats the last
    /// entry once exhausted.
    Sequence(Mutex<Vec<Result<ProviderResponse, CoreError>>>),
}

/// A provider double with a scripted response.
pub struct StubProvider {
    model_id: String,
    script: Script,
    delay: Option<Duration>,
    inline_references: bool,
    calls: AtomicUsize,
}

impl StubProvider {
    /// Always succeed synchronously with `output_count` inline PNGs.
    pub fn completed(model_id: impl Into<String>, output_count: usize) -> Self {
        Self {
            model_id: model_id.into(),
            script: Script::Completed { output_count },
            delay: None,
            inline_references: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer `Accepted` with the given correlation id.
    pub fn accepted(model_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            script: Script::Accepted {
                correlation_id: correlation_id.into(),
            },
            delay: None,
            inline_references: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with the given error.
    pub fn failing(model_id: impl Into<String>, error: CoreError) -> Self {
        Self {
            model_id: model_id.into(),
            script: Script::Fail(error),
            delay: None,
            inline_references: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Play back the given responses in order.
    pub fn scripted(
        model_id: impl Into<String>,
        responses: Vec<Result<ProviderResponse, CoreError>>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            script: Script::Sequence(Mutex::new(responses)),
            delay: None,
            inline_references: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside each `generate` call (cancel-race tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report that reference images must be hydrated inline.
    pub fn with_inline_references(mut self) -> Self {
        self.inline_references = true;
        self
    }

    /// Number of `generate` calls observed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn success(output_count: usize) -> ProviderResponse {
        let outputs = (0..output_count)
            .map(|_| ProviderOutput {
                payload: OutputPayload::Bytes(TINY_PNG.to_vec()),
                media_type: MediaType::Image,
                width: None,
                height: None,
                duration_secs: None,
            })
            .collect();
        ProviderResponse::Completed(ProviderSuccess {
            outputs,
            metrics: Some(ComputeMetrics {
                compute_seconds: Some(2.0),
            }),
        })
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn pricing(&self) -> ModelPricing {
        ModelPricing::default()
    }

    fn requires_inline_references(&self) -> bool {
        self.inline_references
    }

    async fn generate(&self, _request: &ProviderRequest) -> Result<ProviderResponse, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Completed { output_count } => Ok(Self::success(*output_count)),
            Script::Accepted { correlation_id } => Ok(ProviderResponse::Accepted {
                correlation_id: correlation_id.clone(),
            }),
            Script::Fail(error) => Err(error.clone()),
            Script::Sequence(remaining) => {
                let mut remaining = remaining.lock().expect("stub script lock");
                if remaining.len() > 1 {
                    remaining.remove(0)
                } else {
                    remaining
                        .first()
                        .cloned()
                        .unwrap_or_else(|| Ok(Self::success(1)))
                }
            }
        }
    }
}
