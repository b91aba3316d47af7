use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::PipelineError;

/// Storage notification envelope published on `video-uploaded`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct S3EventMessage {
    pub event_name: String,
    /// `"{bucket}/{object path}"`.
    pub key: String,
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct S3EventRecord {
    pub event_name: String,
    pub event_time: String,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct S3Object {
    pub key: String,
    pub size: u64,
    pub e_tag: String,
    pub content_type: String,
}

/// A parsed upload notification: where the raw video lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEvent {
    pub event_name: String,
    pub bucket: String,
    pub key: String,
}

impl UploadEvent {
    pub fn from_payload(payload: &[u8]) -> Result<Self, PipelineError> {
        let message: S3EventMessage = serde_json::from_slice(payload)?;
        Self::from_message(&message)
    }

    pub fn from_message(message: &S3EventMessage) -> Result<Self, PipelineError> {
        let (bucket, key) = split_bucket_and_key(&message.key)
            .ok_or_else(|| PipelineError::InvalidObjectKey(message.key.clone()))?;

        Ok(Self {
            event_name: message.event_name.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

/// `"bucket/raw/a.mp4"` -> `("bucket", "raw/a.mp4")`. Both halves must be non-empty.
pub fn split_bucket_and_key(path: &str) -> Option<(&str, &str)> {
    let (bucket, key) = path.split_once('/')?;
    (!bucket.is_empty() && !key.is_empty()).then_some((bucket, key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Processing,
    Ready,
    Failed,
}

/// Published on `video-progress-update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub video_id: Uuid,
    pub status: VideoStatus,
    pub object_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
}

/// Published on `video-processed` once per uploaded artifact of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProcessed {
    pub video_id: Uuid,
    pub object_key: String,
    #[serde(flatten)]
    pub payload: ProcessedPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ProcessedPayload {
    Manifest(ManifestData),
    Variant(VariantData),
    Thumbnail(ThumbnailData),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestData {
    pub quality: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantData {
    pub quality: String,
    pub total_segments: usize,
    /// Whole seconds, summed from `#EXTINF` entries.
    pub total_duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailData {
    pub width: u32,
    pub height: u32,
}
