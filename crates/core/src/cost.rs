//! Generation cost computation.
//!
//! Cost is attached to a generation atomically with the `completed`
//! transition. When the provider reports actual compute metrics those are
//! authoritative; otherwise we fall back to a per-model flat estimate.

use serde::{Deserialize, Serialize};

/// Compute metrics reported by a provider alongside a finished generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputeMetrics {
    /// Billable GPU-seconds consumed.
    pub compute_seconds: Option<f64>,
}

/// Pricing for one model, resolved from the provider registry.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// Price per billable compute second, in cents.
    pub cents_per_compute_second: f64,
    /// Flat estimate per produced output when no metrics are reported.
    pub estimated_cents_per_output: i64,
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            cents_per_compute_second: 0.5,
            estimated_cents_per_output: 4,
        }
    }
}

/// Compute the cost in cents for a completed generation.
///
/// Uses `metrics.compute_seconds` when present (rounded up to a whole
/// cent), otherwise `output_count` times the model's flat estimate. Always
/// at least 1 cent for a completed generation with outputs, so "completed"
/// implies a non-null, non-zero cost.
pub fn cost_cents(
    metrics: Option<&ComputeMetrics>,
    pricing: &ModelPricing,
    output_count: usize,
) -> i64 {
    let raw = match metrics.and_then(|m| m.compute_seconds) {
        Some(secs) if secs > 0.0 => (secs * pricing.cents_per_compute_second).ceil() as i64,
        _ => pricing.estimated_cents_per_output * output_count as i64,
    };
    raw.max(if output_count > 0 { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICING: ModelPricing = ModelPricing {
        cents_per_compute_second: 0.5,
        estimated_cents_per_output: 4,
    };

    #[test]
    fn metrics_take_precedence_over_estimate() {
        let metrics = ComputeMetrics {
            compute_seconds: Some(20.0),
        };
        assert_eq!(cost_cents(Some(&metrics), &PRICING, 1), 10);
    }

    #[test]
    fn fractional_cents_round_up() {
        let metrics = ComputeMetrics {
            compute_seconds: Some(1.1),
        };
        // 1.1 * 0.5 = 0.55 -> 1 cent
        assert_eq!(cost_cents(Some(&metrics), &PRICING, 1), 1);
    }

    #[test]
    fn falls_back_to_per_output_estimate() {
        assert_eq!(cost_cents(None, &PRICING, 3), 12);
    }

    #[test]
    fn zero_metrics_fall_back_to_estimate() {
        let metrics = ComputeMetrics {
            compute_seconds: Some(0.0),
        };
        assert_eq!(cost_cents(Some(&metrics), &PRICING, 2), 8);
    }

    #[test]
    fn completed_with_outputs_is_never_free() {
        let cheap = ModelPricing {
            cents_per_compute_second: 0.001,
            estimated_cents_per_output: 0,
        };
        assert_eq!(cost_cents(None, &cheap, 1), 1);
        assert_eq!(cost_cents(None, &cheap, 0), 0);
    }
}
