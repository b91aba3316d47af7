use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_PLAYLIST_NAME, DEFAULT_SEGMENT_DURATION, DEFAULT_SEGMENT_FORMAT,
    DEFAULT_SEGMENT_PREFIX, PLAYLIST_TYPE_VOD,
};

/// Invoked once per parsed progress line of an encoder run.
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// One progress sample extracted from the encoder's diagnostic stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    /// 0-100, capped at 100.
    pub percentage: f64,
    pub duration: Duration,
    pub current: Duration,
    /// Verbatim `speed=` token, e.g. "2.34x".
    pub speed: String,
    /// Verbatim `bitrate=` token, e.g. "1234.5kbits/s".
    pub bitrate: String,
}

/// Options for one HLS rendition. A ladder is an ordered list of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentOptions {
    /// Subdirectory name of the rendition inside the output directory.
    pub quality_name: String,

    pub segment_duration: String,
    pub playlist_type: String,
    pub playlist_name: String,
    pub segment_prefix: String,
    pub segment_format: String,

    pub video_codec: Option<String>,
    /// Takes precedence over `video_quality` when both are set.
    pub video_bitrate: Option<String>,
    /// CRF value.
    pub video_quality: Option<String>,
    /// `WxH`, applied through a scale filter.
    pub resolution: Option<String>,
    pub frame_rate: Option<String>,

    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<String>,
    pub audio_channels: Option<String>,
    pub audio_sample_rate: Option<String>,

    /// AES-128 key info file; encryption is enabled when set.
    pub key_info_file: Option<PathBuf>,

    /// Appended after every other option, right before the playlist path.
    pub custom_args: Vec<String>,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            quality_name: String::new(),
            segment_duration: DEFAULT_SEGMENT_DURATION.to_string(),
            playlist_type: PLAYLIST_TYPE_VOD.to_string(),
            playlist_name: DEFAULT_PLAYLIST_NAME.to_string(),
            segment_prefix: DEFAULT_SEGMENT_PREFIX.to_string(),
            segment_format: DEFAULT_SEGMENT_FORMAT.to_string(),
            video_codec: None,
            video_bitrate: None,
            video_quality: None,
            resolution: None,
            frame_rate: None,
            audio_codec: None,
            audio_bitrate: None,
            audio_channels: None,
            audio_sample_rate: None,
            key_info_file: None,
            custom_args: Vec::new(),
        }
    }
}

/// Decoded `ffprobe -print_format json -show_format -show_streams` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeInfo {
    pub format: FormatInfo,
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatInfo {
    pub filename: String,
    pub nb_streams: u32,
    pub nb_programs: u32,
    pub format_name: String,
    pub format_long_name: String,
    pub start_time: Option<String>,
    pub duration: Option<String>,
    pub size: Option<String>,
    pub bit_rate: Option<String>,
    pub probe_score: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamInfo {
    pub index: u32,
    pub codec_name: Option<String>,
    pub codec_long_name: Option<String>,
    pub profile: Option<String>,
    pub codec_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub pix_fmt: Option<String>,
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
    pub tags: HashMap<String, String>,
}

impl ProbeInfo {
    /// First video stream, or `None` for audio-only files.
    pub fn video_stream(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.codec_type == "video")
    }

    /// First audio stream, or `None` for silent files.
    pub fn audio_stream(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.codec_type == "audio")
    }

    pub fn is_video(&self) -> bool {
        self.video_stream().is_some()
    }

    pub fn is_audio(&self) -> bool {
        self.audio_stream().is_some()
    }

    /// Container duration as reported in seconds by the prober.
    pub fn duration(&self) -> Option<Duration> {
        let secs: f64 = self.format.duration.as_deref()?.trim().parse().ok()?;
        Duration::try_from_secs_f64(secs).ok()
    }

    pub fn resolution(&self) -> Option<(u32, u32)> {
        let video = self.video_stream()?;
        Some((video.width?, video.height?))
    }

    /// Codec names grouped by stream type.
    pub fn codecs(&self) -> BTreeMap<String, Vec<String>> {
        let mut codecs: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for stream in &self.streams {
            if let Some(name) = &stream.codec_name {
                codecs
                    .entry(stream.codec_type.clone())
                    .or_default()
                    .push(name.clone());
            }
        }
        codecs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "aac", "codec_type": "audio", "sample_rate": "48000", "channels": 2},
            {"index": 1, "codec_name": "h264", "codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30/1"}
        ],
        "format": {
            "filename": "input",
            "nb_streams": 2,
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "12.500000",
            "size": "1048576",
            "bit_rate": "671088"
        }
    }"#;

    #[test]
    fn decodes_probe_output() {
        let info: ProbeInfo = serde_json::from_str(PROBE_JSON).unwrap();

        assert_eq!(info.format.nb_streams, 2);
        assert_eq!(info.duration(), Some(Duration::from_millis(12_500)));
        assert_eq!(info.resolution(), Some((1920, 1080)));
        assert_eq!(info.video_stream().unwrap().index, 1);
        assert_eq!(info.audio_stream().unwrap().channels, Some(2));
    }

    #[test]
    fn missing_stream_is_not_an_error() {
        let info: ProbeInfo = serde_json::from_str(
            r#"{"streams": [{"codec_name": "mp3", "codec_type": "audio"}], "format": {}}"#,
        )
        .unwrap();

        assert!(info.video_stream().is_none());
        assert!(!info.is_video());
        assert!(info.is_audio());
        assert_eq!(info.resolution(), None);
        assert_eq!(info.duration(), None);
    }

    #[test]
    fn out_of_range_duration_is_unknown() {
        for raw in ["1e300", "-3.5", "NaN", "inf"] {
            let info: ProbeInfo = serde_json::from_str(&format!(
                r#"{{"streams": [], "format": {{"duration": "{raw}"}}}}"#
            ))
            .unwrap();
            assert_eq!(info.duration(), None, "duration {raw}");
        }
    }

    #[test]
    fn groups_codecs_by_stream_type() {
        let info: ProbeInfo = serde_json::from_str(PROBE_JSON).unwrap();
        let codecs = info.codecs();

        assert_eq!(codecs["video"], vec!["h264".to_string()]);
        assert_eq!(codecs["audio"], vec!["aac".to_string()]);
    }
}
