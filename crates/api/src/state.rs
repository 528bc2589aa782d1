use std::sync::Arc;

use lumen_pipeline::{PipelineContext, TriggerPool};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`. Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: lumen_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Everything the executor needs (pool, providers, storage, events).
    pub pipeline: PipelineContext,
    /// Supervised direct-mode dispatcher.
    pub triggers: Arc<TriggerPool>,
    /// Centralized event bus for generation lifecycle events.
    pub event_bus: Arc<lumen_events::EventBus>,
}
