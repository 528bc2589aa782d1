//! Worker configuration loaded from environment variables.

use std::time::Duration;

use lumen_storage::BlobStoreConfig;

use crate::QueueSettings;

/// Configuration for a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Semicolon-separated `model-id=base-url` pairs; `stub` for the
    /// in-process adapter.
    pub provider_endpoints: String,
    pub blob_store: BlobStoreConfig,
    pub queue: QueueSettings,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default           |
    /// |-------------------------|-------------------|
    /// | `DATABASE_URL`          | (required)        |
    /// | `PROVIDER_ENDPOINTS`    | `demo-image=stub` |
    /// | `QUEUE_BATCH_SIZE`      | `5`               |
    /// | `JOB_LOCK_TIMEOUT_SECS` | `300`             |
    /// | `JOB_RETRY_DELAY_SECS`  | `30`              |
    /// | `WORKER_POLL_SECS`      | `1`               |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let provider_endpoints = std::env::var("PROVIDER_ENDPOINTS")
            .unwrap_or_else(|_| "demo-image=stub".into());

        let batch_size: i64 = std::env::var("QUEUE_BATCH_SIZE")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("QUEUE_BATCH_SIZE must be a valid i64");

        let lock_timeout_secs: i64 = std::env::var("JOB_LOCK_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("JOB_LOCK_TIMEOUT_SECS must be a valid i64");

        let retry_delay_secs: i64 = std::env::var("JOB_RETRY_DELAY_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("JOB_RETRY_DELAY_SECS must be a valid i64");

        let poll_secs: u64 = std::env::var("WORKER_POLL_SECS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("WORKER_POLL_SECS must be a valid u64");

        Self {
            database_url,
            provider_endpoints,
            blob_store: crate::blob_store_from_env(),
            queue: QueueSettings {
                batch_size,
                lock_timeout_secs,
                retry_delay_secs,
                poll_interval: Duration::from_secs(poll_secs),
            },
        }
    }
}
