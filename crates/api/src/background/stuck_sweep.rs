//! Periodic stuck-generation detection.
//!
//! Processing rows that never produced a trail step or heartbeat were
//! admitted and then lost (a crashed worker, a dropped dispatch); rows
//! with a stale heartbeat have an executor that went silent mid-flight.
//! The sweep re-dispatches the former and flags the latter for operator
//! attention. Runs on a fixed interval until `cancel` is triggered.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use lumen_pipeline::{stuck, PipelineContext, TriggerPool};

/// Run the stuck-generation sweep loop.
pub async fn run(
    ctx: PipelineContext,
    triggers: Arc<TriggerPool>,
    interval_secs: u64,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs, "Stuck-generation sweep started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stuck-generation sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match stuck::sweep(&ctx, &triggers).await {
                    Ok(report) => {
                        if !report.restarted.is_empty() || !report.flagged.is_empty() {
                            tracing::info!(
                                restarted = report.restarted.len(),
                                flagged = report.flagged.len(),
                                "Stuck sweep acted on generations"
                            );
                        } else {
                            tracing::debug!("Stuck sweep found nothing to do");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Stuck sweep failed");
                    }
                }
            }
        }
    }
}
