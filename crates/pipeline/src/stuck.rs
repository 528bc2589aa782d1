//! Stuck-generation detection.
//!
//! Two distinct failure shapes hide inside a long-lived `processing` row:
//! a trigger that never reached an executor (no trail activity, no
//! heartbeat) and an executor that died mid-flight (stale heartbeat).
//! The first is safely restartable; the second is only flagged, because
//! the provider may still deliver a late result or webhook and the
//! conditional updates will sort out whoever arrives first.

use chrono::Utc;

use lumen_core::error::CoreError;
use lumen_core::types::{DbId, Timestamp};
use lumen_db::models::generation::Generation;
use lumen_db::models::status::is_terminal;
use lumen_db::repositories::GenerationRepo;
use lumen_events::PipelineEvent;

use crate::trigger::TriggerPool;
use crate::{db_error, PipelineContext};

/// A processing row with no sign of an executor after this long was
/// never started. Generous against slow queue pickup, tiny against real
/// generation latency.
pub const NEVER_STARTED_AFTER_SECS: i64 = 10;

/// Minimum age before a row with past activity can be considered stalled.
pub const STALLED_MIN_AGE_SECS: i64 = 600;

/// How stale a heartbeat must be before the executor counts as dead.
pub const HEARTBEAT_STALE_AFTER_SECS: i64 = 300;

/// Max candidate rows examined per sweep pass.
const SWEEP_BATCH: i64 = 100;

/// Why a processing row was deemed stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckKind {
    /// No executor ever touched the row; re-triggering is safe.
    NeverStarted,
    /// An executor started and went silent; flag, never restart.
    Stalled,
}

/// Classify one processing row against the stuck heuristics.
pub fn classify(generation: &Generation, now: Timestamp) -> Option<StuckKind> {
    if is_terminal(generation.status_id) {
        return None;
    }
    let age_secs = (now - generation.created_at).num_seconds();
    let params = generation.parsed_params();

    let never_started =
        params.steps_since_admission() == 0 && generation.last_heartbeat_at.is_none();
    if never_started {
        return (age_secs > NEVER_STARTED_AFTER_SECS).then_some(StuckKind::NeverStarted);
    }

    if age_secs > STALLED_MIN_AGE_SECS {
        let last_activity = generation.last_heartbeat_at.unwrap_or(generation.created_at);
        if (now - last_activity).num_seconds() > HEARTBEAT_STALE_AFTER_SECS {
            return Some(StuckKind::Stalled);
        }
    }
    None
}

/// What one sweep pass did.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub restarted: Vec<DbId>,
    pub flagged: Vec<DbId>,
}

/// Scan old processing rows, re-trigger the never-started ones, and flag
/// the stalled ones. Runs on a server-side schedule; no client traffic
/// is needed for a stuck row to be noticed.
pub async fn sweep(
    ctx: &PipelineContext,
    triggers: &TriggerPool,
) -> Result<SweepReport, CoreError> {
    let candidates =
        GenerationRepo::find_processing_older_than(&ctx.pool, NEVER_STARTED_AFTER_SECS, SWEEP_BATCH)
            .await
            .map_err(db_error)?;

    let now = Utc::now();
    let mut report = SweepReport::default();
    for generation in candidates {
        match classify(&generation, now) {
            Some(StuckKind::NeverStarted) => {
                tracing::warn!(
                    generation_id = generation.id,
                    "Re-triggering never-started generation"
                );
                triggers.dispatch(generation.id);
                report.restarted.push(generation.id);
            }
            Some(StuckKind::Stalled) => {
                tracing::warn!(
                    generation_id = generation.id,
                    last_heartbeat_at = ?generation.last_heartbeat_at,
                    "Generation stalled mid-flight"
                );
                ctx.events.publish(
                    PipelineEvent::new("generation.stuck", generation.id)
                        .with_user(generation.user_id)
                        .with_payload(serde_json::json!({
                            "age_secs": (now - generation.created_at).num_seconds(),
                            "last_heartbeat_at": generation.last_heartbeat_at,
                        })),
                );
                report.flagged.push(generation.id);
            }
            None => {}
        }
    }

    if !report.restarted.is_empty() || !report.flagged.is_empty() {
        tracing::info!(
            restarted = report.restarted.len(),
            flagged = report.flagged.len(),
            "Stuck sweep finished"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lumen_core::params::{GenerationParams, STEP_CREATE, STEP_HEARTBEAT};
    use lumen_db::models::status::GenerationStatus;

    fn row(
        age_secs: i64,
        heartbeat_age_secs: Option<i64>,
        extra_steps: bool,
        now: Timestamp,
    ) -> Generation {
        let created_at = now - Duration::seconds(age_secs);
        let mut params = GenerationParams::default();
        params.push_step(STEP_CREATE, created_at);
        if extra_steps {
            params.push_step(STEP_HEARTBEAT, created_at);
        }
        Generation {
            id: 1,
            session_id: 1,
            user_id: 7,
            model_id: "demo-image".into(),
            prompt: "a red fox".into(),
            negative_prompt: None,
            params: serde_json::to_value(&params).unwrap(),
            status_id: GenerationStatus::Processing.id(),
            cost_cents: None,
            error_message: None,
            error_kind: None,
            error_at: None,
            last_heartbeat_at: heartbeat_age_secs.map(|s| now - Duration::seconds(s)),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn fresh_rows_are_healthy() {
        let now = Utc::now();
        assert_eq!(classify(&row(5, None, false, now), now), None);
    }

    #[test]
    fn no_activity_past_threshold_is_never_started() {
        let now = Utc::now();
        assert_eq!(
            classify(&row(30, None, false, now), now),
            Some(StuckKind::NeverStarted)
        );
    }

    #[test]
    fn trail_activity_disqualifies_never_started() {
        let now = Utc::now();
        // Executor wrote a step but the row is still young: healthy.
        assert_eq!(classify(&row(30, None, true, now), now), None);
    }

    #[test]
    fn heartbeat_disqualifies_never_started() {
        let now = Utc::now();
        assert_eq!(classify(&row(30, Some(5), false, now), now), None);
    }

    #[test]
    fn old_row_with_stale_heartbeat_is_stalled() {
        let now = Utc::now();
        assert_eq!(
            classify(&row(700, Some(400), true, now), now),
            Some(StuckKind::Stalled)
        );
    }

    #[test]
    fn old_row_with_recent_heartbeat_is_healthy() {
        let now = Utc::now();
        assert_eq!(classify(&row(700, Some(8), true, now), now), None);
    }

    #[test]
    fn old_row_with_activity_but_no_heartbeat_is_stalled() {
        let now = Utc::now();
        assert_eq!(
            classify(&row(700, None, true, now), now),
            Some(StuckKind::Stalled)
        );
    }

    #[test]
    fn terminal_rows_are_never_stuck() {
        let now = Utc::now();
        let mut generation = row(700, None, false, now);
        generation.status_id = GenerationStatus::Failed.id();
        assert_eq!(classify(&generation, now), None);
    }
}
