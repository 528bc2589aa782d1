//! Typed generation parameter bag.
//!
//! The parameter payload stored on a generation row mixes three concerns
//! with very different audiences: user-facing settings, the observability
//! debug trail, and the provider correlation id used by the webhook path.
//! Each gets a named, typed field so the client projection is a
//! compile-time-checked subset instead of a runtime allow-list filter.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Debug trail entries are capped to bound row growth; the oldest entries
/// are dropped first.
pub const MAX_TRAIL_ENTRIES: usize = 100;

/// Trail marker written by the admission handler when the row is created.
pub const STEP_CREATE: &str = "generate:create";

/// Trail marker written by the executor each heartbeat interval.
pub const STEP_HEARTBEAT: &str = "generate:heartbeat";

/// Trail marker written when a provider accepts work for webhook delivery.
pub const STEP_ACCEPTED: &str = "generate:accepted";

// ---------------------------------------------------------------------------
// Trail
// ---------------------------------------------------------------------------

/// One structured step marker in a generation's debug trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailEntry {
    pub step: String,
    pub at: Timestamp,
}

// ---------------------------------------------------------------------------
// Reference images
// ---------------------------------------------------------------------------

/// A reference image supplied with a generation request.
///
/// Clients may submit inline base64 bytes; the admission handler rewrites
/// those to durable blob-store pointers before the row is persisted, so the
/// generation row stays small and the params are safe to echo back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceImage {
    /// Raw bytes, base64-encoded. Only ever seen on the inbound request.
    Inline { data: String },
    /// Durable blob-store pointer plus a hex SHA-256 of the raw bytes.
    Stored { url: String, checksum: String },
}

impl ReferenceImage {
    /// Decode an inline payload to raw bytes.
    ///
    /// Returns `Validation` for a `Stored` pointer or undecodable base64.
    pub fn decode_inline(&self) -> Result<Vec<u8>, CoreError> {
        match self {
            ReferenceImage::Inline { data } => base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| {
                    CoreError::Validation(format!("reference image is not valid base64: {e}"))
                }),
            ReferenceImage::Stored { .. } => Err(CoreError::Validation(
                "reference image is already stored".into(),
            )),
        }
    }

    /// Re-encode raw bytes as an inline payload (provider hydration path).
    pub fn inline_from_bytes(bytes: &[u8]) -> Self {
        ReferenceImage::Inline {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter bag
// ---------------------------------------------------------------------------

/// User-facing generation settings. This struct is the entire client
/// projection: anything not in here is never echoed back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiParams {
    /// Aspect ratio as `"W:H"`, e.g. `"16:9"`.
    pub aspect_ratio: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    #[serde(default)]
    pub reference_images: Vec<ReferenceImage>,
    /// Provider-specific passthrough settings (seed, steps, cfg, ...).
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The full parameter payload persisted in `generations.params`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default)]
    pub ui: UiParams,
    #[serde(default)]
    pub debug_trail: Vec<TrailEntry>,
    /// Provider-assigned id matched by the webhook completion path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_correlation: Option<String>,
}

impl GenerationParams {
    /// Append a step marker at `now`, dropping the oldest entries past
    /// [`MAX_TRAIL_ENTRIES`].
    pub fn push_step(&mut self, step: impl Into<String>, now: Timestamp) {
        self.debug_trail.push(TrailEntry {
            step: step.into(),
            at: now,
        });
        if self.debug_trail.len() > MAX_TRAIL_ENTRIES {
            let excess = self.debug_trail.len() - MAX_TRAIL_ENTRIES;
            self.debug_trail.drain(..excess);
        }
    }

    /// The client-safe projection of this parameter bag.
    pub fn client_view(&self) -> &UiParams {
        &self.ui
    }

    /// Number of trail entries recorded after the admission marker.
    ///
    /// Zero means the executor never started (no heartbeat, no step beyond
    /// `generate:create`) — the signal for the never-started heuristic.
    pub fn steps_since_admission(&self) -> usize {
        self.debug_trail
            .iter()
            .filter(|e| e.step != STEP_CREATE)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Aspect ratio
// ---------------------------------------------------------------------------

/// Parse an aspect ratio string like `"16:9"` into `(w, h)`.
pub fn parse_aspect_ratio(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once(':')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some((w, h))
}

/// Base edge length used when deriving default output dimensions.
pub const DEFAULT_BASE_EDGE: u32 = 1024;

/// Derive default output dimensions from an aspect ratio when the provider
/// did not report any. The longer edge is pinned to
/// [`DEFAULT_BASE_EDGE`]; falls back to a square when the ratio is absent
/// or unparseable.
pub fn default_dimensions(aspect_ratio: Option<&str>) -> (u32, u32) {
    match aspect_ratio.and_then(parse_aspect_ratio) {
        Some((w, h)) if w >= h => {
            let height = (DEFAULT_BASE_EDGE as u64 * h as u64 / w as u64) as u32;
            (DEFAULT_BASE_EDGE, height.max(1))
        }
        Some((w, h)) => {
            let width = (DEFAULT_BASE_EDGE as u64 * w as u64 / h as u64) as u32;
            (width.max(1), DEFAULT_BASE_EDGE)
        }
        None => (DEFAULT_BASE_EDGE, DEFAULT_BASE_EDGE),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn trail_caps_at_limit_dropping_oldest() {
        let mut params = GenerationParams::default();
        let now = Utc::now();
        params.push_step(STEP_CREATE, now);
        for i in 0..MAX_TRAIL_ENTRIES + 10 {
            params.push_step(format!("step:{i}"), now);
        }
        assert_eq!(params.debug_trail.len(), MAX_TRAIL_ENTRIES);
        // The admission marker was among the oldest and fell off.
        assert_eq!(params.debug_trail[0].step, "step:10");
        assert_eq!(
            params.debug_trail.last().unwrap().step,
            format!("step:{}", MAX_TRAIL_ENTRIES + 9)
        );
    }

    #[test]
    fn steps_since_admission_ignores_create_marker() {
        let mut params = GenerationParams::default();
        let now = Utc::now();
        params.push_step(STEP_CREATE, now);
        assert_eq!(params.steps_since_admission(), 0);
        params.push_step(STEP_HEARTBEAT, now);
        assert_eq!(params.steps_since_admission(), 1);
    }

    #[test]
    fn client_view_exposes_only_ui_fields() {
        let mut params = GenerationParams {
            provider_correlation: Some("corr-1".into()),
            ..Default::default()
        };
        params.push_step(STEP_CREATE, Utc::now());
        params.ui.aspect_ratio = Some("16:9".into());

        let view = serde_json::to_value(params.client_view()).unwrap();
        assert_eq!(view["aspect_ratio"], "16:9");
        assert!(view.get("debug_trail").is_none());
        assert!(view.get("provider_correlation").is_none());
    }

    #[test]
    fn inline_round_trips_through_base64() {
        let bytes = b"\x89PNG\r\n\x1a\n fake image";
        let inline = ReferenceImage::inline_from_bytes(bytes);
        assert_eq!(inline.decode_inline().unwrap(), bytes);
    }

    #[test]
    fn decode_inline_rejects_stored_pointer() {
        let stored = ReferenceImage::Stored {
            url: "s3://bucket/key".into(),
            checksum: "abc".into(),
        };
        assert!(stored.decode_inline().is_err());
    }

    #[test]
    fn aspect_ratio_parsing() {
        assert_eq!(parse_aspect_ratio("16:9"), Some((16, 9)));
        assert_eq!(parse_aspect_ratio("1:1"), Some((1, 1)));
        assert_eq!(parse_aspect_ratio("0:9"), None);
        assert_eq!(parse_aspect_ratio("wide"), None);
    }

    #[test]
    fn default_dimensions_pin_longer_edge() {
        assert_eq!(default_dimensions(Some("16:9")), (1024, 576));
        assert_eq!(default_dimensions(Some("9:16")), (576, 1024));
        assert_eq!(default_dimensions(Some("1:1")), (1024, 1024));
        assert_eq!(default_dimensions(None), (1024, 1024));
        assert_eq!(default_dimensions(Some("junk")), (1024, 1024));
    }

    #[test]
    fn params_deserialize_from_sparse_json() {
        // Older rows may lack fields entirely; everything must default.
        let params: GenerationParams = serde_json::from_str("{}").unwrap();
        assert!(params.debug_trail.is_empty());
        assert!(params.provider_correlation.is_none());
    }
}
