use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod s3;

pub use s3::StorageService;

/// Object storage as seen by the processing pipeline.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn download(&self, key: &str, bucket: &str) -> Result<Bytes>;

    async fn upload(&self, key: &str, bucket: &str, body: Bytes, content_type: &str) -> Result<()>;
}
