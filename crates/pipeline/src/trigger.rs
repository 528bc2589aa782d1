//! Direct-mode trigger supervision.
//!
//! In direct mode there is no queue to re-deliver work, so the trigger
//! itself carries the retry policy: a short fixed schedule, after which
//! the generation is marked failed rather than left stuck in
//! `processing`. Dispatches run on supervised tasks behind a concurrency
//! limit; nothing here blocks the admission response.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use lumen_core::backoff::{max_trigger_attempts, trigger_delay};
use lumen_core::error::CoreError;
use lumen_core::types::DbId;
use lumen_db::repositories::GenerationRepo;
use lumen_events::PipelineEvent;

use crate::executor::{execute, ExecuteOutcome};
use crate::PipelineContext;

/// Sleep seam so the retry schedule is testable without real delays.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Default cap on concurrently running direct-mode executions.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Supervised fire-and-forget dispatcher for direct-mode executions.
pub struct TriggerPool {
    ctx: PipelineContext,
    clock: Arc<dyn Clock>,
    permits: Arc<Semaphore>,
}

impl TriggerPool {
    pub fn new(ctx: PipelineContext, max_concurrent: usize) -> Self {
        Self::with_clock(ctx, Arc::new(TokioClock), max_concurrent)
    }

    pub fn with_clock(
        ctx: PipelineContext,
        clock: Arc<dyn Clock>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            ctx,
            clock,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Launch an execution for a generation and return immediately.
    ///
    /// The spawned task retries through the trigger schedule and, when
    /// the schedule is exhausted, marks the generation failed so the row
    /// never hangs in `processing` with nobody working on it. The handle
    /// is returned for tests; production callers drop it.
    pub fn dispatch(&self, generation_id: DbId) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let clock = Arc::clone(&self.clock);
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = match permits.acquire().await {
                Ok(permit) => permit,
                // Semaphore closed means shutdown; drop the work.
                Err(_) => return,
            };
            let result =
                run_with_retries(clock.as_ref(), || execute(&ctx, generation_id)).await;
            if let Err(error) = result {
                exhaust(&ctx, generation_id, error).await;
            }
        })
    }
}

/// Run `attempt` through the trigger retry schedule, sleeping between
/// tries via `clock`. Returns the first success, or the last error once
/// the schedule is exhausted.
pub async fn run_with_retries<F, Fut>(
    clock: &dyn Clock,
    mut attempt: F,
) -> Result<ExecuteOutcome, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ExecuteOutcome, CoreError>>,
{
    let mut last_error = None;
    for number in 0..max_trigger_attempts() {
        match trigger_delay(number) {
            Some(delay) if !delay.is_zero() => clock.sleep(delay).await,
            _ => {}
        }
        match attempt().await {
            Ok(outcome) => return Ok(outcome),
            Err(error) => {
                tracing::warn!(attempt = number, %error, "Trigger attempt failed");
                last_error = Some(error);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| CoreError::Internal("empty trigger schedule".into())))
}

/// Final fallback after the schedule ran out: pin the failure on the row.
async fn exhaust(ctx: &PipelineContext, generation_id: DbId, error: CoreError) {
    let message = format!(
        "failed to start after {} attempts: {error}",
        max_trigger_attempts()
    );
    match GenerationRepo::fail_if_processing(&ctx.pool, generation_id, &message, error.kind())
        .await
    {
        Ok(true) => {
            tracing::error!(generation_id, %error, "Trigger retries exhausted");
            ctx.events.publish(
                PipelineEvent::new("generation.failed", generation_id).with_payload(
                    serde_json::json!({
                        "error_kind": error.kind(),
                        "error_message": message,
                    }),
                ),
            );
        }
        Ok(false) => {}
        Err(db) => {
            tracing::error!(generation_id, %db, "Could not mark generation failed after retries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records requested delays instead of sleeping.
    struct RecordingClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingClock {
        fn new() -> Self {
            Self {
                sleeps: Mutex::new(Vec::new()),
            }
        }

        fn recorded(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for RecordingClock {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let clock = RecordingClock::new();
        let calls = AtomicUsize::new(0);

        let outcome = run_with_retries(&clock, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(ExecuteOutcome::Completed { output_count: 1 }) }
        })
        .await
        .unwrap();

        assert!(matches!(outcome, ExecuteOutcome::Completed { output_count: 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.recorded().is_empty(), "no delay before the first try");
    }

    #[tokio::test]
    async fn retries_follow_the_schedule_until_success() {
        let clock = RecordingClock::new();
        let calls = AtomicUsize::new(0);

        let outcome = run_with_retries(&clock, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CoreError::Internal("db unreachable".into()))
                } else {
                    Ok(ExecuteOutcome::Skipped)
                }
            }
        })
        .await
        .unwrap();

        assert!(matches!(outcome, ExecuteOutcome::Skipped));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            clock.recorded(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test]
    async fn exhaustion_returns_the_last_error() {
        let clock = RecordingClock::new();
        let calls = AtomicUsize::new(0);

        let error = run_with_retries(&clock, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err::<ExecuteOutcome, _>(CoreError::Internal(format!("attempt {n} down")))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), max_trigger_attempts());
        assert_eq!(error.to_string(), "Internal error: attempt 3 down");
        assert_eq!(
            clock.recorded(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(6)
            ]
        );
    }
}
