//! Retry schedules for the pipeline.
//!
//! Two distinct policies live here: the direct-mode trigger retry (a short
//! fixed schedule before the generation is marked failed) and the queue
//! retry delay applied when a claimed job fails.

use std::time::Duration;

/// Delays between direct-mode trigger attempts. After the schedule is
/// exhausted the generation is marked failed rather than left stuck.
pub const TRIGGER_RETRY_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(6),
];

/// Default delay before a failed job becomes claimable again.
pub const DEFAULT_JOB_RETRY_DELAY_SECS: u64 = 30;

/// Delay to wait before trigger attempt number `attempt` (1-based retry
/// count; attempt 0 is the initial try and has no delay). `None` once the
/// schedule is exhausted.
pub fn trigger_delay(attempt: usize) -> Option<Duration> {
    if attempt == 0 {
        return Some(Duration::ZERO);
    }
    TRIGGER_RETRY_SCHEDULE.get(attempt - 1).copied()
}

/// Total number of trigger attempts (initial try plus retries).
pub fn max_trigger_attempts() -> usize {
    TRIGGER_RETRY_SCHEDULE.len() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_increases_then_exhausts() {
        assert_eq!(trigger_delay(0), Some(Duration::ZERO));
        assert_eq!(trigger_delay(1), Some(Duration::from_secs(2)));
        assert_eq!(trigger_delay(2), Some(Duration::from_secs(4)));
        assert_eq!(trigger_delay(3), Some(Duration::from_secs(6)));
        assert_eq!(trigger_delay(4), None);
    }

    #[test]
    fn four_total_attempts() {
        assert_eq!(max_trigger_attempts(), 4);
    }
}
