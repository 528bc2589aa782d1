//! S3-backed blob store.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use lumen_core::error::CoreError;

use crate::BlobStore;

/// [`BlobStore`] backed by an S3 bucket.
///
/// URLs are `{public_base_url}/{key}`; S3 `put_object` on an existing key
/// overwrites in place, which gives the idempotency the completion paths
/// rely on.
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3BlobStore {
    /// Build a store from the ambient AWS environment configuration.
    ///
    /// `public_base_url` is the CDN or bucket endpoint under which stored
    /// keys are reachable, without a trailing slash.
    pub async fn from_env(bucket: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn key_from_url<'a>(&self, url: &'a str) -> Result<&'a str, CoreError> {
        url.strip_prefix(&self.public_base_url)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| {
                CoreError::Internal(format!("URL does not belong to this blob store: {url}"))
            })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, CoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                CoreError::UpstreamUnavailable(format!("S3 put failed for '{key}': {e}"))
            })?;

        tracing::debug!(bucket = %self.bucket, key, "Stored blob");
        Ok(format!("{}/{key}", self.public_base_url))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, CoreError> {
        let key = self.key_from_url(url)?;
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                CoreError::UpstreamUnavailable(format!("S3 get failed for '{key}': {e}"))
            })?;

        let bytes = object.body.collect().await.map_err(|e| {
            CoreError::UpstreamUnavailable(format!("S3 body read failed for '{key}': {e}"))
        })?;
        Ok(bytes.into_bytes().to_vec())
    }
}
