//! In-memory blob store for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use lumen_core::error::CoreError;

use crate::BlobStore;

const URL_SCHEME: &str = "memory://";

/// A `HashMap`-backed [`BlobStore`]. URLs are `memory://{key}`.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects. Test assertion helper.
    pub fn object_count(&self) -> usize {
        self.objects.lock().expect("memory store lock").len()
    }

    /// Whether a key is present. Test assertion helper.
    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .expect("memory store lock")
            .contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, CoreError> {
        self.objects
            .lock()
            .expect("memory store lock")
            .insert(key.to_string(), bytes);
        Ok(format!("{URL_SCHEME}{key}"))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, CoreError> {
        let key = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| CoreError::Internal(format!("not a memory store URL: {url}")))?;
        self.objects
            .lock()
            .expect("memory store lock")
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Blob", key))
    }
}
