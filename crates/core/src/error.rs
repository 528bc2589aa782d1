//! Domain error taxonomy for the generation pipeline.
//!
//! Every provider, storage, and validation failure is classified into one
//! of these variants before it is persisted on a generation or surfaced to
//! a client. The `kind()` string is what lands in the `error_kind` column.

use serde::Serialize;

/// Domain-level error shared by all crates.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
pub enum CoreError {
    /// Missing or malformed request fields. Not retryable.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing/invalid credentials or a bad webhook signature.
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// Authenticated but lacking access to the referenced resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown session, model, generation, or output.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The provider rejected the prompt or image on safety grounds.
    #[error("Content rejected by safety filter: {0}")]
    ContentSafety(String),

    /// Provider quota or throughput exhausted. Retryable with backoff.
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// Provider infrastructure error, timeout, or network failure. Retryable.
    #[error("Upstream provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Unclassified/unexpected failure. Treated as our bug, not retried.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable kind, persisted in `generations.error_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation",
            CoreError::Auth(_) => "auth",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::NotFound { .. } => "not_found",
            CoreError::ContentSafety(_) => "content_safety",
            CoreError::RateLimited(_) => "rate_limited",
            CoreError::UpstreamUnavailable(_) => "upstream_unavailable",
            CoreError::Internal(_) => "internal",
        }
    }

    /// Whether retrying the same request can succeed without user action.
    ///
    /// Only provider-side exhaustion and infrastructure failures qualify;
    /// everything else needs changed input or is our own bug.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            CoreError::RateLimited(_) | CoreError::UpstreamUnavailable(_)
        )
    }

    /// Shorthand for a [`CoreError::NotFound`] with a displayable id.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
