//! Generation orchestration pipeline.
//!
//! The executor drives a generation from `processing` to a terminal
//! status against an external provider; the completion routine is shared
//! with the webhook path; the trigger pool supervises direct-mode
//! fire-and-forget dispatch; stuck classification backs the watchdog
//! sweep. Every entry point is safe to invoke concurrently with every
//! other: the generation status guard, not locking, resolves races.

use std::sync::Arc;

use lumen_db::DbPool;
use lumen_events::EventBus;
use lumen_providers::ProviderRegistry;
use lumen_storage::BlobStore;

pub mod complete;
pub mod executor;
pub mod stuck;
pub mod trigger;

pub use executor::{execute, ExecuteOutcome};
pub use trigger::TriggerPool;

pub(crate) fn db_error(error: sqlx::Error) -> lumen_core::error::CoreError {
    lumen_core::error::CoreError::Internal(format!("database error: {error}"))
}

/// Everything an executor invocation needs. Cheap to clone; each
/// invocation is an independent, stateless unit on top of this.
#[derive(Clone)]
pub struct PipelineContext {
    pub pool: DbPool,
    pub registry: Arc<ProviderRegistry>,
    pub storage: Arc<dyn BlobStore>,
    pub events: Arc<EventBus>,
}
