//! Blob store seam.
//!
//! Output bytes and reference images are persisted through the
//! [`BlobStore`] trait and addressed by durable URL afterwards. Writes
//! are idempotent on the same key: uploading `generations/7/outputs/0`
//! twice yields the same URL and one object, which is what makes the
//! duplicated completion paths safe at the storage layer.

use std::sync::Arc;

use async_trait::async_trait;

use lumen_core::error::CoreError;
use lumen_core::types::DbId;

pub mod memory;
pub mod s3;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

/// Durable, idempotent byte storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist bytes under `key`, returning a durable URL. Writing the
    /// same key again overwrites in place and returns the same URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, CoreError>;

    /// Fetch bytes by a durable URL previously returned from [`put`](Self::put).
    async fn get(&self, url: &str) -> Result<Vec<u8>, CoreError>;
}

/// Deployment selection for the blob store backend.
#[derive(Debug, Clone)]
pub enum BlobStoreConfig {
    /// Process-local storage for tests and development.
    Memory,
    /// An S3 bucket fronted by `public_base_url`.
    S3 {
        bucket: String,
        public_base_url: String,
    },
}

impl BlobStoreConfig {
    /// Build the selected backend.
    pub async fn connect(self) -> Arc<dyn BlobStore> {
        match self {
            BlobStoreConfig::Memory => {
                tracing::warn!("Using in-memory blob store, objects will not survive restart");
                Arc::new(MemoryBlobStore::new())
            }
            BlobStoreConfig::S3 {
                bucket,
                public_base_url,
            } => Arc::new(S3BlobStore::from_env(bucket, public_base_url).await),
        }
    }
}

/// Storage key for one output artifact, keyed by generation id and index
/// so retried completions overwrite rather than accumulate.
pub fn output_key(generation_id: DbId, index: usize, extension: &str) -> String {
    format!("generations/{generation_id}/outputs/{index}.{extension}")
}

/// Storage key for an inline reference image, keyed by content checksum
/// so identical uploads dedupe.
pub fn reference_key(checksum_hex: &str) -> String {
    format!("references/{checksum_hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_keys_are_stable_per_generation_and_index() {
        assert_eq!(output_key(7, 0, "png"), "generations/7/outputs/0.png");
        assert_eq!(output_key(7, 1, "mp4"), "generations/7/outputs/1.mp4");
    }

    #[test]
    fn reference_keys_dedupe_on_checksum() {
        assert_eq!(reference_key("abc123"), "references/abc123");
    }
}
