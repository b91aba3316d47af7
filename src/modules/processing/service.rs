use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use super::error::{PipelineError, Stage};
use super::events::{
    ManifestData, ProcessedPayload, ThumbnailData, UploadEvent, VariantData, VideoStatus,
};
use super::model::{
    Artifact, THUMBNAIL_HEIGHT, THUMBNAIL_TIME_OFFSET, THUMBNAIL_WIDTH, WorkDir,
    video_id_from_key,
};
use super::notifier::Notifier;
use crate::config::settings::AppConfig;
use crate::infrastructure::ffmpeg::constants::{
    DEFAULT_PLAYLIST_NAME, EXT_M3U8, EXT_TS, MASTER_PLAYLIST_NAME,
};
use crate::infrastructure::ffmpeg::{Encoder, ProgressCallback, ProgressInfo, SegmentOptions};
use crate::infrastructure::storage::Storage;

/// Quality reported for playlists at the root of the HLS tree.
pub const QUALITY_DEFAULT: &str = "default";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Parent of the per-job working directories.
    pub work_root: PathBuf,
    pub processed_bucket: String,
    pub ladder: Vec<SegmentOptions>,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            work_root: config.work_dir.clone(),
            processed_bucket: config.processed_bucket.clone(),
            ladder: config.ladder.clone(),
        }
    }
}

/// Outcome of one dequeued message.
#[derive(Debug)]
pub struct JobReport {
    /// `None` when the payload failed validation before an id was known.
    pub video_id: Option<Uuid>,
    pub source_key: Option<String>,
    pub result: Result<JobSummary, PipelineError>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub master_playlist_key: String,
    /// Every HLS artifact key, in upload order.
    pub uploaded: Vec<String>,
    /// `None` when the thumbnail stage degraded.
    pub thumbnail_key: Option<String>,
    pub elapsed: Duration,
}

pub struct TranscodeService {
    encoder: Arc<dyn Encoder>,
    storage: Arc<dyn Storage>,
    notifier: Notifier,
    settings: PipelineSettings,
}

impl TranscodeService {
    pub fn new(
        encoder: Arc<dyn Encoder>,
        storage: Arc<dyn Storage>,
        notifier: Notifier,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            encoder,
            storage,
            notifier,
            settings,
        }
    }

    /// Validates an upload notification and runs the whole job for it.
    ///
    /// Publishes `processing` once the message validates, then `ready` or
    /// `failed`; a panic inside the job counts as `failed`. A cancelled job
    /// publishes nothing further.
    pub async fn handle_message(&self, cancel: &CancellationToken, payload: &[u8]) -> JobReport {
        let event = match UploadEvent::from_payload(payload) {
            Ok(event) => event,
            Err(e) => {
                return JobReport {
                    video_id: None,
                    source_key: None,
                    result: Err(e),
                };
            }
        };

        let video_id = match video_id_from_key(&event.key) {
            Ok(id) => id,
            Err(e) => {
                return JobReport {
                    video_id: None,
                    source_key: Some(event.key),
                    result: Err(e),
                };
            }
        };

        let span = info_span!("job", video_id = %video_id);
        let result = async {
            info!("📦 Processing {}/{}", event.bucket, event.key);
            self.notifier
                .status(video_id, VideoStatus::Processing, &event.key)
                .await;

            // The working directory guard cleans up while unwinding.
            let result = AssertUnwindSafe(self.process_video(cancel, video_id, &event))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(PipelineError::panicked(panic.as_ref())));
            match &result {
                Ok(summary) => {
                    info!(
                        "✅ Video processing completed in {:?} ({} files)",
                        summary.elapsed,
                        summary.uploaded.len()
                    );
                    self.notifier
                        .status(video_id, VideoStatus::Ready, &event.key)
                        .await;
                }
                Err(e) if e.is_cancelled() => {
                    warn!("Job cancelled during {}", e.stage());
                }
                Err(_) => {
                    self.notifier
                        .status(video_id, VideoStatus::Failed, &event.key)
                        .await;
                }
            }
            result
        }
        .instrument(span)
        .await;

        JobReport {
            video_id: Some(video_id),
            source_key: Some(event.key),
            result,
        }
    }

    /// Runs one validated job inside its own working directory, which is
    /// removed on every exit path.
    pub async fn process_video(
        &self,
        cancel: &CancellationToken,
        video_id: Uuid,
        event: &UploadEvent,
    ) -> Result<JobSummary, PipelineError> {
        self.encoder
            .is_available(cancel)
            .await
            .map_err(|e| PipelineError::encoder(Stage::Availability, e))?;

        let work_root = &self.settings.work_root;
        let work_dir = WorkDir::create(work_root, video_id)
            .await
            .map_err(|e| PipelineError::io(Stage::Prepare, work_root, e))?;

        let result = self.run_stages(cancel, video_id, event, &work_dir).await;

        let path = work_dir.path().to_path_buf();
        match work_dir.cleanup().await {
            Ok(()) => debug!("Removed working directory {}", path.display()),
            Err(e) => warn!("Failed to remove working directory {}: {}", path.display(), e),
        }

        result
    }

    async fn run_stages(
        &self,
        cancel: &CancellationToken,
        video_id: Uuid,
        event: &UploadEvent,
        work_dir: &WorkDir,
    ) -> Result<JobSummary, PipelineError> {
        let started = Instant::now();

        // Download
        info!("⬇️ Downloading {}/{}", event.bucket, event.key);
        let data = tokio::select! {
            result = self.storage.download(&event.key, &event.bucket) => {
                result.map_err(|source| PipelineError::Download {
                    bucket: event.bucket.clone(),
                    key: event.key.clone(),
                    source,
                })?
            }
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled(Stage::Download)),
        };
        info!("⬇️ Downloaded {} bytes", data.len());

        let input = work_dir.input_path();
        tokio::fs::write(&input, &data)
            .await
            .map_err(|e| PipelineError::io(Stage::Download, &input, e))?;
        drop(data);

        // Probe
        let probe = self
            .encoder
            .probe(cancel, &input)
            .await
            .map_err(|e| PipelineError::encoder(Stage::Probe, e))?;
        info!(
            format = %probe.format.format_name,
            duration = probe.format.duration.as_deref().unwrap_or_default(),
            size = probe.format.size.as_deref().unwrap_or_default(),
            streams = probe.streams.len(),
            resolution = ?probe.resolution(),
            codecs = ?probe.codecs(),
            "Video file information"
        );
        if !probe.is_video() {
            warn!("Input has no video stream");
        }

        // Segment
        let hls_dir = work_dir.hls_dir();
        let ladder = &self.settings.ladder;
        info!("🎞️ Starting video segmentation ({} quality levels)", ladder.len());

        let segment_started = Instant::now();
        let progress: ProgressCallback = Arc::new(|sample: ProgressInfo| {
            debug!(
                percentage = sample.percentage,
                speed = %sample.speed,
                bitrate = %sample.bitrate,
                "Segmentation progress"
            );
        });
        let master = self
            .encoder
            .segment_video_multi_quality(cancel, &input, &hls_dir, ladder, Some(progress))
            .await
            .map_err(|e| PipelineError::encoder(Stage::Segment, e))?;
        info!(
            "🎞️ Video segmentation completed in {:?}",
            segment_started.elapsed()
        );

        // Thumbnail (best-effort)
        let thumbnail_path = work_dir.thumbnail_path();
        let thumbnail = match self
            .encoder
            .create_thumbnail(
                cancel,
                &input,
                &thumbnail_path,
                THUMBNAIL_TIME_OFFSET,
                Some((THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT)),
            )
            .await
        {
            Ok(()) if thumbnail_path.is_file() => {
                info!("🖼️ Thumbnail created at {}", thumbnail_path.display());
                Some(thumbnail_path)
            }
            Ok(()) => {
                warn!("Thumbnail extraction produced no file");
                None
            }
            Err(e) if e.is_cancelled() => return Err(PipelineError::Cancelled(Stage::Thumbnail)),
            Err(e) => {
                warn!("Failed to create thumbnail: {}", e);
                None
            }
        };

        // Upload
        let artifacts = collect_artifacts(video_id, &hls_dir)?;
        let master_playlist_key = artifacts
            .iter()
            .find(|a| a.path == master)
            .map(|a| a.key.clone())
            .unwrap_or_else(|| format!("{}/hls/{}", video_id, MASTER_PLAYLIST_NAME));

        let mut uploaded = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled(Stage::Upload));
            }
            let size = self.upload(artifact).await?;
            uploaded.push(artifact.key.clone());

            if let Some(payload) = describe_playlist(&hls_dir, artifact, size).await {
                self.notifier
                    .processed(video_id, &artifact.key, payload)
                    .await;
            }
        }
        info!("⬆️ Uploaded {} HLS files", uploaded.len());

        let thumbnail_key = match thumbnail {
            Some(path) => self.upload_thumbnail(video_id, &path).await,
            None => None,
        };

        Ok(JobSummary {
            master_playlist_key,
            uploaded,
            thumbnail_key,
            elapsed: started.elapsed(),
        })
    }

    /// Uploads one artifact and returns its size in bytes.
    async fn upload(&self, artifact: &Artifact) -> Result<u64, PipelineError> {
        let body = tokio::fs::read(&artifact.path)
            .await
            .map_err(|e| PipelineError::io(Stage::Upload, &artifact.path, e))?;
        let size = body.len() as u64;

        self.storage
            .upload(
                &artifact.key,
                &self.settings.processed_bucket,
                Bytes::from(body),
                artifact.content_type,
            )
            .await
            .map_err(|source| PipelineError::Upload {
                key: artifact.key.clone(),
                source,
            })?;

        debug!("Uploaded {} ({} bytes)", artifact.key, size);
        Ok(size)
    }

    async fn upload_thumbnail(&self, video_id: Uuid, path: &Path) -> Option<String> {
        let artifact = Artifact::thumbnail(video_id, path);

        match self.upload(&artifact).await {
            Ok(_) => {
                info!("🖼️ Thumbnail uploaded to {}", artifact.key);
                self.notifier
                    .processed(
                        video_id,
                        &artifact.key,
                        ProcessedPayload::Thumbnail(ThumbnailData {
                            width: THUMBNAIL_WIDTH,
                            height: THUMBNAIL_HEIGHT,
                        }),
                    )
                    .await;
                Some(artifact.key)
            }
            Err(e) => {
                warn!("Failed to upload thumbnail: {}", e);
                None
            }
        }
    }
}

/// Every regular file under `hls_dir`, sorted by path.
pub fn collect_artifacts(video_id: Uuid, hls_dir: &Path) -> Result<Vec<Artifact>, PipelineError> {
    let mut artifacts = Vec::new();

    for entry in WalkDir::new(hls_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| PipelineError::io(Stage::Upload, hls_dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(artifact) = Artifact::hls(video_id, hls_dir, entry.path()) {
            artifacts.push(artifact);
        }
    }

    Ok(artifacts)
}

/// Event payload for playlists: the master becomes a manifest, per-quality
/// playlists become variants. Other files yield nothing.
async fn describe_playlist(
    hls_dir: &Path,
    artifact: &Artifact,
    size: u64,
) -> Option<ProcessedPayload> {
    let extension = artifact.path.extension()?.to_str()?;
    if !extension.eq_ignore_ascii_case(EXT_M3U8) {
        return None;
    }

    let quality = quality_of(hls_dir, &artifact.path);
    if quality == QUALITY_DEFAULT {
        return Some(ProcessedPayload::Manifest(ManifestData {
            quality,
            size_bytes: size,
        }));
    }

    let dir = artifact.path.parent()?;
    let (total_segments, total_duration) = variant_stats(dir).await;
    Some(ProcessedPayload::Variant(VariantData {
        quality,
        total_segments,
        total_duration,
    }))
}

/// `480p/segment_001.ts` -> `480p`; files at the root report `default`.
pub fn quality_of(hls_dir: &Path, path: &Path) -> String {
    path.strip_prefix(hls_dir)
        .ok()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| QUALITY_DEFAULT.to_string())
}

/// Segment count and whole-second duration of the rendition in `dir`.
async fn variant_stats(dir: &Path) -> (usize, u64) {
    let mut segments = 0;
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_segment = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == EXT_TS);
            if is_segment && path.is_file() {
                segments += 1;
            }
        }
    }

    let duration = tokio::fs::read_to_string(dir.join(DEFAULT_PLAYLIST_NAME))
        .await
        .map(|playlist| playlist_duration(&playlist))
        .unwrap_or_default();

    (segments, duration as u64)
}

/// Sum of the `#EXTINF:<seconds>,` entries of a media playlist.
pub fn playlist_duration(playlist: &str) -> f64 {
    playlist
        .lines()
        .filter_map(|line| line.trim().strip_prefix("#EXTINF:"))
        .filter_map(|rest| rest.split(',').next()?.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .sum()
}
