use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumen_api::config::ServerConfig;
use lumen_api::router::build_app_router;
use lumen_api::state::AppState;
use lumen_api::background;
use lumen_pipeline::{PipelineContext, TriggerPool};
use lumen_storage::BlobStoreConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumen_api=debug,lumen_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, queue_mode = ?config.queue_mode, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = lumen_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    lumen_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    lumen_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Providers ---
    let registry = Arc::new(lumen_providers::ProviderRegistry::from_spec(
        &config.provider_endpoints,
    ));
    tracing::info!(models = ?registry.model_ids(), "Provider registry built");

    // --- Blob storage ---
    let storage = blob_store_from_env().connect().await;

    // --- Event bus ---
    let event_bus = Arc::new(lumen_events::EventBus::default());
    tracing::info!("Event bus created");

    // --- Pipeline ---
    let pipeline = PipelineContext {
        pool: pool.clone(),
        registry,
        storage,
        events: Arc::clone(&event_bus),
    };
    let triggers = Arc::new(TriggerPool::new(
        pipeline.clone(),
        config.max_concurrent_triggers,
    ));

    // --- Stuck-generation sweep ---
    let sweep_cancel = tokio_util::sync::CancellationToken::new();
    let sweep_handle = tokio::spawn(background::stuck_sweep::run(
        pipeline.clone(),
        Arc::clone(&triggers),
        config.stuck_sweep_interval_secs,
        sweep_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        pipeline,
        triggers,
        event_bus,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    tracing::info!("Stuck-generation sweep stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Decide the blob store backend from `S3_BUCKET` / `PUBLIC_ASSET_BASE_URL`.
fn blob_store_from_env() -> BlobStoreConfig {
    match std::env::var("S3_BUCKET") {
        Ok(bucket) => BlobStoreConfig::S3 {
            bucket,
            public_base_url: std::env::var("PUBLIC_ASSET_BASE_URL")
                .expect("PUBLIC_ASSET_BASE_URL must be set when S3_BUCKET is"),
        },
        Err(_) => BlobStoreConfig::Memory,
    }
}
