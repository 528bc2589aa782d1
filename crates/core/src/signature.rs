//! Webhook signature verification and payload hashing.
//!
//! Providers sign callbacks with HMAC-SHA256 over `"{timestamp}.{body}"`
//! using a shared secret. Verification is constant-time via
//! [`hmac::Mac::verify_slice`]. Callbacks older than
//! [`MAX_CALLBACK_AGE_SECS`] are rejected to bound replay risk.

use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::types::Timestamp;

type HmacSha256 = Hmac<Sha256>;

/// Callbacks with a signing timestamp older than this are rejected.
pub const MAX_CALLBACK_AGE_SECS: i64 = 300;

/// Compute the hex HMAC-SHA256 signature for `"{timestamp}.{body}"`.
pub fn sign(secret: &str, timestamp_unix: i64, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{timestamp_unix}.{body}").as_bytes());
    hex_encode(&mac.finalize().into_bytes())
}

/// Verify a webhook signature and its freshness.
///
/// `provided` is the hex signature from the provider's header. Returns
/// `Auth` on mismatch, undecodable hex, or a timestamp older than
/// [`MAX_CALLBACK_AGE_SECS`] relative to `now`.
pub fn verify(
    secret: &str,
    timestamp_unix: i64,
    body: &str,
    provided: &str,
    now: Timestamp,
) -> Result<(), CoreError> {
    let signed_at = Utc
        .timestamp_opt(timestamp_unix, 0)
        .single()
        .ok_or_else(|| CoreError::Auth("invalid signature timestamp".into()))?;

    if (now - signed_at).num_seconds() > MAX_CALLBACK_AGE_SECS {
        return Err(CoreError::Auth("stale webhook signature".into()));
    }

    let expected = hex_decode(provided)
        .ok_or_else(|| CoreError::Auth("signature is not valid hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{timestamp_unix}.{body}").as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| CoreError::Auth("webhook signature mismatch".into()))
}

/// Hex SHA-256 of arbitrary bytes. Used for reference-image checksums.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_encode(&Sha256::digest(bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
