#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use reel_transcoder::common::clock::Clock;
use reel_transcoder::infrastructure::ffmpeg::{
    Encoder, EncoderError, ProbeInfo, ProgressCallback, Result as EncoderResult, SegmentOptions,
};
use reel_transcoder::infrastructure::queue::{Acknowledger, ConsumedMessage, EventPublisher};
use reel_transcoder::infrastructure::storage::Storage;
use reel_transcoder::modules::processing::events::{ProgressEvent, VideoProcessed};
use reel_transcoder::modules::processing::ladder::default_ladder;
use reel_transcoder::modules::processing::{Notifier, PipelineSettings, TranscodeService};

pub const VIDEO_ID: &str = "550e8400-e29b-41d4-a716-446655440000";
pub const PROCESSED_BUCKET: &str = "video-processed";

pub fn upload_payload(key: &str) -> Vec<u8> {
    serde_json::json!({
        "EventName": "s3:ObjectCreated:Put",
        "Key": key,
        "Records": [{
            "eventName": "s3:ObjectCreated:Put",
            "eventTime": "2024-05-01T10:00:00.000Z",
            "s3": {
                "bucket": {"name": "raw"},
                "object": {"key": key, "size": 4, "eTag": "etag", "contentType": "video/mp4"}
            }
        }]
    })
    .to_string()
    .into_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub key: String,
    pub bucket: String,
    pub content_type: String,
    pub size: usize,
}

/// Object storage held in memory.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<(String, String), Bytes>>,
    pub downloads: Mutex<Vec<(String, String)>>,
    pub uploads: Mutex<Vec<StoredUpload>>,
    /// Uploads whose key contains this fragment fail.
    pub fail_uploads_matching: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn with_object(bucket: &str, key: &str, body: &'static [u8]) -> Self {
        let storage = Self::default();
        storage
            .objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), Bytes::from_static(body));
        storage
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.key.clone())
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn download(&self, key: &str, bucket: &str) -> anyhow::Result<Bytes> {
        self.downloads
            .lock()
            .unwrap()
            .push((key.to_string(), bucket.to_string()));

        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {}/{}", bucket, key))
    }

    async fn upload(
        &self,
        key: &str,
        bucket: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<()> {
        let failing = self.fail_uploads_matching.lock().unwrap().clone();
        if let Some(fragment) = failing {
            if key.contains(&fragment) {
                anyhow::bail!("connection reset uploading {}", key);
            }
        }

        self.uploads.lock().unwrap().push(StoredUpload {
            key: key.to_string(),
            bucket: bucket.to_string(),
            content_type: content_type.to_string(),
            size: body.len(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderCall {
    Available,
    Probe(PathBuf),
    MultiQuality(Vec<String>),
    Thumbnail { offset: String, size: Option<(u32, u32)> },
}

/// Encoder double that writes a plausible HLS tree instead of encoding.
#[derive(Default)]
pub struct StubEncoder {
    pub calls: Mutex<Vec<EncoderCall>>,
    pub unavailable: bool,
    pub fail_quality: Option<String>,
    pub fail_thumbnail: bool,
    pub panic_on_segment: bool,
    /// Segmentation waits for cancellation, signalling `segment_started` first.
    pub block_segment: bool,
    pub segment_started: Notify,
    /// Working directories observed through the input path.
    pub inputs: Mutex<Vec<PathBuf>>,
}

impl StubEncoder {
    pub fn calls(&self) -> Vec<EncoderCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: EncoderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn failure(line: &str) -> EncoderError {
    EncoderError::ProcessFailed {
        program: "ffmpeg".to_string(),
        code: Some(1),
        stderr: vec![line.to_string()],
    }
}

#[async_trait]
impl Encoder for StubEncoder {
    async fn is_available(&self, _cancel: &CancellationToken) -> EncoderResult<()> {
        self.record(EncoderCall::Available);
        if self.unavailable {
            return Err(EncoderError::Spawn {
                program: "ffmpeg".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(())
    }

    async fn version(&self, _cancel: &CancellationToken) -> EncoderResult<String> {
        Ok("ffmpeg version stub".to_string())
    }

    async fn probe(&self, _cancel: &CancellationToken, input: &Path) -> EncoderResult<ProbeInfo> {
        self.record(EncoderCall::Probe(input.to_path_buf()));
        self.inputs.lock().unwrap().push(input.to_path_buf());

        Ok(serde_json::from_str(
            r#"{"format": {"format_name": "mov,mp4", "duration": "12.0", "size": "4"},
                "streams": [{"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080}]}"#,
        )?)
    }

    async fn segment_video(
        &self,
        _cancel: &CancellationToken,
        _input: &Path,
        output_dir: &Path,
        options: &SegmentOptions,
        _progress: Option<ProgressCallback>,
    ) -> EncoderResult<()> {
        tokio::fs::create_dir_all(output_dir).await?;
        let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
        for index in 0..2 {
            let segment = format!("{}_{:03}.{}", options.segment_prefix, index, options.segment_format);
            tokio::fs::write(output_dir.join(&segment), b"segment").await?;
            playlist.push_str(&format!("#EXTINF:6.000000,\n{segment}\n"));
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(output_dir.join(&options.playlist_name), playlist).await?;
        Ok(())
    }

    async fn segment_video_multi_quality(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output_dir: &Path,
        ladder: &[SegmentOptions],
        progress: Option<ProgressCallback>,
    ) -> EncoderResult<PathBuf> {
        self.record(EncoderCall::MultiQuality(
            ladder.iter().map(|o| o.quality_name.clone()).collect(),
        ));

        if self.panic_on_segment {
            panic!("encoder exploded");
        }
        if self.block_segment {
            self.segment_started.notify_one();
            cancel.cancelled().await;
            return Err(EncoderError::Cancelled {
                program: "ffmpeg".to_string(),
            });
        }

        for options in ladder {
            if self.fail_quality.as_deref() == Some(options.quality_name.as_str()) {
                return Err(EncoderError::Rendition {
                    quality: options.quality_name.clone(),
                    source: Box::new(failure("Error while opening encoder")),
                });
            }
            self.segment_video(
                cancel,
                input,
                &output_dir.join(&options.quality_name),
                options,
                progress.clone(),
            )
            .await?;
        }

        let master = output_dir.join("master.m3u8");
        tokio::fs::write(&master, "#EXTM3U\n#EXT-X-VERSION:3\n").await?;
        Ok(master)
    }

    async fn create_thumbnail(
        &self,
        _cancel: &CancellationToken,
        _input: &Path,
        output: &Path,
        time_offset: &str,
        size: Option<(u32, u32)>,
    ) -> EncoderResult<()> {
        self.record(EncoderCall::Thumbnail {
            offset: time_offset.to_string(),
            size,
        });
        if self.fail_thumbnail {
            return Err(failure("Output file is empty, nothing was encoded"));
        }
        tokio::fs::write(output, b"jpeg").await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub messages: Mutex<Vec<Published>>,
}

impl RecordingPublisher {
    pub fn progress_events(&self) -> Vec<ProgressEvent> {
        self.decode("video-progress-update")
    }

    pub fn processed_events(&self) -> Vec<VideoProcessed> {
        self.decode("video-processed")
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, topic: &str) -> Vec<T> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| serde_json::from_slice(&m.payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(Published {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Acked,
    Rejected,
}

#[derive(Default)]
pub struct RecordingAcker {
    settlements: Mutex<Vec<Settlement>>,
}

impl RecordingAcker {
    pub fn settlements(&self) -> Vec<Settlement> {
        self.settlements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Acknowledger for RecordingAcker {
    async fn ack(&self) -> anyhow::Result<()> {
        self.settlements.lock().unwrap().push(Settlement::Acked);
        Ok(())
    }

    async fn reject(&self) -> anyhow::Result<()> {
        self.settlements.lock().unwrap().push(Settlement::Rejected);
        Ok(())
    }
}

pub fn message(topic: &str, payload: Vec<u8>) -> (ConsumedMessage, Arc<RecordingAcker>) {
    let acker = Arc::new(RecordingAcker::default());
    let message = ConsumedMessage::new(topic, None, payload, acker.clone());
    (message, acker)
}

pub struct FixedClock(pub OffsetDateTime);

impl Default for FixedClock {
    fn default() -> Self {
        Self(datetime!(2024-05-01 10:00:00 UTC))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

pub struct Harness {
    pub encoder: Arc<StubEncoder>,
    pub storage: Arc<MemoryStorage>,
    pub publisher: Arc<RecordingPublisher>,
    pub work_root: tempfile::TempDir,
}

impl Harness {
    pub fn new(encoder: StubEncoder, storage: MemoryStorage) -> Self {
        Self {
            encoder: Arc::new(encoder),
            storage: Arc::new(storage),
            publisher: Arc::new(RecordingPublisher::default()),
            work_root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn service(&self) -> TranscodeService {
        TranscodeService::new(
            self.encoder.clone(),
            self.storage.clone(),
            Notifier::new(self.publisher.clone(), Arc::new(FixedClock::default())),
            PipelineSettings {
                work_root: self.work_root.path().to_path_buf(),
                processed_bucket: PROCESSED_BUCKET.to_string(),
                ladder: default_ladder(),
            },
        )
    }

    /// Entries left under the working root.
    pub fn leftovers(&self) -> usize {
        std::fs::read_dir(self.work_root.path()).unwrap().count()
    }
}
