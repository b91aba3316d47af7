//! Rendition ladder driving and master playlist synthesis.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Encoder;
use super::constants::MASTER_PLAYLIST_NAME;
use super::error::{EncoderError, Result};
use super::types::{ProgressCallback, SegmentOptions};

/// Parses `"1000k"`, `"2M"`, `"1.5m"` or `"500"` into bits per second.
/// Anything unparsable yields 0.
pub fn parse_bitrate(bitrate: &str) -> u64 {
    let bitrate = bitrate.trim().to_lowercase();
    if bitrate.is_empty() {
        return 0;
    }

    let (number, multiplier) = if let Some(n) = bitrate.strip_suffix('k') {
        (n, 1_000.0)
    } else if let Some(n) = bitrate.strip_suffix('m') {
        (n, 1_000_000.0)
    } else {
        (bitrate.as_str(), 1.0)
    };

    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => (value * multiplier) as u64,
        _ => 0,
    }
}

/// Declared bandwidth of a rendition: video plus audio bitrate.
pub fn bandwidth(video_bitrate: Option<&str>, audio_bitrate: Option<&str>) -> u64 {
    video_bitrate.map(parse_bitrate).unwrap_or(0) + audio_bitrate.map(parse_bitrate).unwrap_or(0)
}

/// Master playlist lines, accumulated while the ladder is walked.
#[derive(Debug, Clone)]
pub struct MasterPlaylist {
    lines: Vec<String>,
}

impl Default for MasterPlaylist {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterPlaylist {
    pub fn new() -> Self {
        Self {
            lines: vec!["#EXTM3U".to_string(), "#EXT-X-VERSION:3".to_string()],
        }
    }

    pub fn add_variant(&mut self, options: &SegmentOptions) {
        let mut stream_info = format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={}",
            bandwidth(
                options.video_bitrate.as_deref(),
                options.audio_bitrate.as_deref()
            )
        );
        if let Some(resolution) = options.resolution.as_deref().filter(|r| !r.is_empty()) {
            stream_info.push_str(&format!(",RESOLUTION={resolution}"));
        }

        self.lines.push(stream_info);
        self.lines
            .push(format!("{}/{}", options.quality_name, options.playlist_name));
    }

    pub fn variant_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.starts_with("#EXT-X-STREAM-INF"))
            .count()
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

/// Segments `input` once per ladder entry, in order, into
/// `{output_dir}/{quality_name}/`, then writes `{output_dir}/master.m3u8`.
///
/// Stops at the first failing rendition; the master playlist is only written
/// once every rendition succeeded.
pub async fn segment_ladder<E>(
    encoder: &E,
    cancel: &CancellationToken,
    input: &Path,
    output_dir: &Path,
    ladder: &[SegmentOptions],
    progress: Option<ProgressCallback>,
) -> Result<PathBuf>
where
    E: Encoder + ?Sized,
{
    tokio::fs::create_dir_all(output_dir).await?;

    let mut master = MasterPlaylist::new();
    for (index, quality) in ladder.iter().enumerate() {
        let quality_dir = output_dir.join(&quality.quality_name);
        tokio::fs::create_dir_all(&quality_dir).await?;

        info!(
            quality = %quality.quality_name,
            position = index + 1,
            total = ladder.len(),
            resolution = quality.resolution.as_deref().unwrap_or_default(),
            bitrate = quality.video_bitrate.as_deref().unwrap_or_default(),
            "Segmenting quality level"
        );

        encoder
            .segment_video(cancel, input, &quality_dir, quality, progress.clone())
            .await
            .map_err(|e| EncoderError::Rendition {
                quality: quality.quality_name.clone(),
                source: Box::new(e),
            })?;

        master.add_variant(quality);
    }

    let master_path = output_dir.join(MASTER_PLAYLIST_NAME);
    tokio::fs::write(&master_path, master.render()).await?;

    info!(
        path = %master_path.display(),
        qualities = master.variant_count(),
        "Created master playlist"
    );

    Ok(master_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ffmpeg::{ProbeInfo, constants::DEFAULT_PLAYLIST_NAME};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn parses_bitrate_strings() {
        let cases = [
            ("1000k", 1_000_000),
            ("1000K", 1_000_000),
            ("2M", 2_000_000),
            ("1.5m", 1_500_000),
            ("500", 500),
            (" 128k ", 128_000),
            ("", 0),
            ("k", 0),
            ("invalid", 0),
            ("12kbps", 0),
            ("-5k", 0),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_bitrate(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn bandwidth_sums_video_and_audio() {
        assert_eq!(bandwidth(Some("2000k"), Some("128k")), 2_128_000);
        assert_eq!(bandwidth(Some("2000k"), None), 2_000_000);
        assert_eq!(bandwidth(None, Some("96k")), 96_000);
        assert_eq!(bandwidth(None, None), 0);
        assert_eq!(bandwidth(Some("garbage"), Some("64k")), 64_000);
    }

    #[test]
    fn renders_master_playlist() {
        let mut master = MasterPlaylist::new();
        master.add_variant(&SegmentOptions {
            quality_name: "480p".to_string(),
            video_bitrate: Some("800k".to_string()),
            audio_bitrate: Some("96k".to_string()),
            resolution: Some("854x480".to_string()),
            ..SegmentOptions::default()
        });
        master.add_variant(&SegmentOptions {
            quality_name: "crf".to_string(),
            video_quality: Some("23".to_string()),
            ..SegmentOptions::default()
        });

        assert_eq!(
            master.render(),
            "#EXTM3U\n#EXT-X-VERSION:3\n\
             #EXT-X-STREAM-INF:BANDWIDTH=896000,RESOLUTION=854x480\n480p/playlist.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=0\ncrf/playlist.m3u8"
        );
        assert_eq!(master.variant_count(), 2);
    }

    /// Writes a playlist per rendition, failing on a chosen quality.
    #[derive(Default)]
    struct FakeSegmenter {
        fail_on: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Encoder for FakeSegmenter {
        async fn is_available(&self, _cancel: &CancellationToken) -> Result<()> {
            Ok(())
        }

        async fn version(&self, _cancel: &CancellationToken) -> Result<String> {
            Ok("ffmpeg version test".to_string())
        }

        async fn probe(&self, _cancel: &CancellationToken, _input: &Path) -> Result<ProbeInfo> {
            Ok(ProbeInfo::default())
        }

        async fn segment_video(
            &self,
            _cancel: &CancellationToken,
            _input: &Path,
            output_dir: &Path,
            options: &SegmentOptions,
            _progress: Option<ProgressCallback>,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(options.quality_name.clone());
            if self.fail_on.as_deref() == Some(options.quality_name.as_str()) {
                return Err(EncoderError::ProcessFailed {
                    program: "ffmpeg".to_string(),
                    code: Some(1),
                    stderr: vec!["Conversion failed!".to_string()],
                });
            }
            tokio::fs::write(output_dir.join(&options.playlist_name), "#EXTM3U\n").await?;
            Ok(())
        }

        async fn create_thumbnail(
            &self,
            _cancel: &CancellationToken,
            _input: &Path,
            _output: &Path,
            _time_offset: &str,
            _size: Option<(u32, u32)>,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn ladder() -> Vec<SegmentOptions> {
        [("480p", "800k", "854x480"), ("720p", "1400k", "1280x720"), ("1080p", "2800k", "1920x1080")]
            .into_iter()
            .map(|(name, bitrate, resolution)| SegmentOptions {
                quality_name: name.to_string(),
                video_bitrate: Some(bitrate.to_string()),
                audio_bitrate: Some("128k".to_string()),
                resolution: Some(resolution.to_string()),
                ..SegmentOptions::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn segments_every_rendition_in_ladder_order() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeSegmenter::default();

        let master_path = encoder
            .segment_video_multi_quality(
                &CancellationToken::new(),
                Path::new("input"),
                dir.path(),
                &ladder(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(*encoder.calls.lock().unwrap(), ["480p", "720p", "1080p"]);
        for name in ["480p", "720p", "1080p"] {
            assert!(dir.path().join(name).join(DEFAULT_PLAYLIST_NAME).is_file());
        }

        let master = std::fs::read_to_string(master_path).unwrap();
        let entries: Vec<&str> = master
            .lines()
            .filter(|l| !l.starts_with('#'))
            .collect();
        assert_eq!(
            entries,
            ["480p/playlist.m3u8", "720p/playlist.m3u8", "1080p/playlist.m3u8"]
        );
        assert_eq!(master.matches("#EXT-X-STREAM-INF").count(), 3);
        assert!(master.contains("BANDWIDTH=1528000,RESOLUTION=1280x720"));
    }

    #[tokio::test]
    async fn failing_rendition_leaves_no_master_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeSegmenter {
            fail_on: Some("720p".to_string()),
            ..FakeSegmenter::default()
        };

        let err = encoder
            .segment_video_multi_quality(
                &CancellationToken::new(),
                Path::new("input"),
                dir.path(),
                &ladder(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(&err, EncoderError::Rendition { quality, .. } if quality == "720p"));
        assert_eq!(err.diagnostics(), ["Conversion failed!"]);
        assert_eq!(*encoder.calls.lock().unwrap(), ["480p", "720p"]);
        assert!(!dir.path().join(MASTER_PLAYLIST_NAME).exists());
        assert!(dir.path().join("480p").join(DEFAULT_PLAYLIST_NAME).is_file());
    }
}
