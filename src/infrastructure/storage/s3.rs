use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

use super::Storage;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
}

impl StorageService {
    pub fn new(endpoint: &str, region: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ S3 client configured for {}", endpoint);

        Self { client }
    }
}

#[async_trait]
impl Storage for StorageService {
    async fn download(&self, key: &str, bucket: &str) -> Result<Bytes> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to get object {}/{}", bucket, key))?;

        let body = object
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read object body {}/{}", bucket, key))?
            .into_bytes();

        debug!("⬇️ Downloaded {} bytes from {}/{}", body.len(), bucket, key);
        Ok(body)
    }

    async fn upload(&self, key: &str, bucket: &str, body: Bytes, content_type: &str) -> Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("Failed to put object {}/{}", bucket, key))?;

        debug!("⬆️ Uploaded {} bytes to {}/{}", size, bucket, key);
        Ok(())
    }
}
