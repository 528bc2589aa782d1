use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumen_worker::{build_context, QueueWorker, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumen_worker=debug,lumen_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    let ctx = build_context(&config).await;
    tracing::info!("Worker context ready");

    let worker = QueueWorker::new(ctx, config.queue.clone());
    let cancel = CancellationToken::new();

    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move { worker.run(loop_cancel).await });

    shutdown_signal().await;
    cancel.cancel();
    let _ = handle.await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM so the worker drains cleanly under both
/// interactive use and a process manager.
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
