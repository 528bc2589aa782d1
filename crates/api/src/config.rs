use crate::auth::jwt::JwtConfig;

/// How admitted generations reach an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Enqueue a job row; a separate worker process claims and runs it.
    Queue,
    /// Dispatch a supervised in-process task immediately.
    Direct,
}

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Generation dispatch mode (default: queue).
    pub queue_mode: QueueMode,
    /// Max jobs claimed per drain cycle (default: `5`).
    pub queue_batch_size: i64,
    /// Age after which a held job lock counts as abandoned (default: `300`).
    pub job_lock_timeout_secs: i64,
    /// Delay before a failed job becomes claimable again (default: `30`).
    pub job_retry_delay_secs: i64,
    /// Cap on concurrent direct-mode executions (default: `8`).
    pub max_concurrent_triggers: usize,
    /// Seconds between stuck-generation sweep passes (default: `30`).
    pub stuck_sweep_interval_secs: u64,
    /// Semicolon-separated `model-id=base-url` provider pairs.
    pub provider_endpoints: String,
    /// Shared secret for provider webhook signatures. When unset,
    /// signature verification is skipped (weaker-security mode).
    pub webhook_secret: Option<String>,
    /// Shared secret for server-to-server process calls. When unset, the
    /// process endpoint accepts bearer-token callers only.
    pub internal_api_secret: Option<String>,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `QUEUE_MODE`               | `queue`                 |
    /// | `QUEUE_BATCH_SIZE`         | `5`                     |
    /// | `JOB_LOCK_TIMEOUT_SECS`    | `300`                   |
    /// | `JOB_RETRY_DELAY_SECS`     | `30`                    |
    /// | `MAX_CONCURRENT_TRIGGERS`  | `8`                     |
    /// | `STUCK_SWEEP_INTERVAL_SECS`| `30`                    |
    /// | `PROVIDER_ENDPOINTS`       | `demo-image=stub`       |
    /// | `WEBHOOK_SECRET`           | unset (verification skipped) |
    /// | `INTERNAL_API_SECRET`      | unset (bearer auth only) |
    ///
    /// # Panics
    ///
    /// Panics when a value fails to parse; misconfiguration should fail
    /// fast at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let queue_mode = match std::env::var("QUEUE_MODE")
            .unwrap_or_else(|_| "queue".into())
            .as_str()
        {
            "queue" => QueueMode::Queue,
            "direct" => QueueMode::Direct,
            other => panic!("QUEUE_MODE must be 'queue' or 'direct', got '{other}'"),
        };

        let queue_batch_size: i64 = std::env::var("QUEUE_BATCH_SIZE")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("QUEUE_BATCH_SIZE must be a valid i64");

        let job_lock_timeout_secs: i64 = std::env::var("JOB_LOCK_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("JOB_LOCK_TIMEOUT_SECS must be a valid i64");

        let job_retry_delay_secs: i64 = std::env::var("JOB_RETRY_DELAY_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("JOB_RETRY_DELAY_SECS must be a valid i64");

        let max_concurrent_triggers: usize = std::env::var("MAX_CONCURRENT_TRIGGERS")
            .unwrap_or_else(|_| "8".into())
            .parse()
            .expect("MAX_CONCURRENT_TRIGGERS must be a valid usize");

        let stuck_sweep_interval_secs: u64 = std::env::var("STUCK_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("STUCK_SWEEP_INTERVAL_SECS must be a valid u64");

        let provider_endpoints = std::env::var("PROVIDER_ENDPOINTS")
            .unwrap_or_else(|_| "demo-image=stub".into());

        let webhook_secret = std::env::var("WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        if webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET is not set, webhook signatures will not be verified");
        }

        let internal_api_secret = std::env::var("INTERNAL_API_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            queue_mode,
            queue_batch_size,
            job_lock_timeout_secs,
            job_retry_delay_secs,
            max_concurrent_triggers,
            stuck_sweep_interval_secs,
            provider_endpoints,
            webhook_secret,
            internal_api_secret,
            jwt: JwtConfig::from_env(),
        }
    }
}
