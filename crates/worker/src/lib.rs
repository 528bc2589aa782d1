//! Queue-mode worker.
//!
//! A single long-lived loop that claims job batches and hands each
//! claimed generation to the pipeline executor. Resolution is
//! best-effort: a job whose terminal delete fails stays locked until the
//! lock times out, gets reclaimed, and is skipped by the executor's
//! idempotency guard. Occasional duplicate claims are preferred over
//! lost work.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use lumen_db::models::job::Job;
use lumen_db::repositories::JobRepo;
use lumen_pipeline::{execute, PipelineContext};
use lumen_storage::BlobStoreConfig;

pub mod config;

pub use config::WorkerConfig;

/// Queue tuning knobs, separated from the rest of the worker config so
/// tests can construct them directly.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Max jobs claimed per poll cycle.
    pub batch_size: i64,
    /// Age after which a held lock counts as abandoned.
    pub lock_timeout_secs: i64,
    /// Delay before a failed job becomes claimable again.
    pub retry_delay_secs: i64,
    /// Pause between poll cycles.
    pub poll_interval: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            lock_timeout_secs: 300,
            retry_delay_secs: 30,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// The claim/execute/resolve loop.
pub struct QueueWorker {
    ctx: PipelineContext,
    settings: QueueSettings,
}

impl QueueWorker {
    pub fn new(ctx: PipelineContext, settings: QueueSettings) -> Self {
        Self { ctx, settings }
    }

    /// Run the poll loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        tracing::info!(
            batch_size = self.settings.batch_size,
            lock_timeout_secs = self.settings.lock_timeout_secs,
            retry_delay_secs = self.settings.retry_delay_secs,
            "Queue worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Queue worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_once().await {
                        tracing::error!(error = %e, "Claim cycle failed");
                    }
                }
            }
        }
    }

    /// One poll cycle: claim a batch and process every job in it.
    /// Returns the number of jobs claimed.
    pub async fn drain_once(&self) -> Result<usize, sqlx::Error> {
        let jobs = JobRepo::claim(
            &self.ctx.pool,
            self.settings.batch_size,
            self.settings.lock_timeout_secs,
        )
        .await?;
        let claimed = jobs.len();
        if claimed > 0 {
            tracing::debug!(claimed, "Claimed job batch");
        }
        for job in jobs {
            self.process(job).await;
        }
        Ok(claimed)
    }

    /// Execute one claimed job and resolve its queue row.
    ///
    /// `Ok` outcomes (completed, accepted, skipped, row missing) delete
    /// the job; an `Err` is infrastructure trouble, so the lock is
    /// released with a retry delay instead. Resolution failures are
    /// logged and swallowed — the lock timeout recovers the job.
    async fn process(&self, job: Job) {
        match execute(&self.ctx, job.generation_id).await {
            Ok(outcome) => {
                tracing::info!(
                    job_id = job.id,
                    generation_id = job.generation_id,
                    attempts = job.attempts,
                    ?outcome,
                    "Job finished",
                );
                if let Err(e) = JobRepo::delete(&self.ctx.pool, job.id).await {
                    tracing::warn!(job_id = job.id, error = %e, "Could not delete finished job");
                }
            }
            Err(error) => {
                tracing::warn!(
                    job_id = job.id,
                    generation_id = job.generation_id,
                    attempts = job.attempts,
                    error = %error,
                    "Job failed, releasing for retry",
                );
                if let Err(e) =
                    JobRepo::release_for_retry(&self.ctx.pool, job.id, self.settings.retry_delay_secs)
                        .await
                {
                    tracing::warn!(job_id = job.id, error = %e, "Could not release failed job");
                }
            }
        }
    }
}

/// Build the pipeline context for a worker process from its config.
pub async fn build_context(config: &WorkerConfig) -> PipelineContext {
    let pool = lumen_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    lumen_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    let registry = lumen_providers::ProviderRegistry::from_spec(&config.provider_endpoints);
    tracing::info!(models = ?registry.model_ids(), "Provider registry built");

    let storage = config.blob_store.clone().connect().await;

    PipelineContext {
        pool,
        registry: std::sync::Arc::new(registry),
        storage,
        events: std::sync::Arc::new(lumen_events::EventBus::default()),
    }
}

/// Decide the blob store backend from `S3_BUCKET` / `PUBLIC_ASSET_BASE_URL`.
pub fn blob_store_from_env() -> BlobStoreConfig {
    match std::env::var("S3_BUCKET") {
        Ok(bucket) => BlobStoreConfig::S3 {
            bucket,
            public_base_url: std::env::var("PUBLIC_ASSET_BASE_URL")
                .expect("PUBLIC_ASSET_BASE_URL must be set when S3_BUCKET is"),
        },
        Err(_) => BlobStoreConfig::Memory,
    }
}
