//! Rendition presets and ladder configuration.

use thiserror::Error;

use crate::infrastructure::ffmpeg::SegmentOptions;
use crate::infrastructure::ffmpeg::constants::*;

pub const DEFAULT_RENDITIONS: &str = "480p,720p,1080p";

/// HLS target duration used by the pipeline, shorter than the encoder default.
pub const SEGMENT_DURATION: &str = "6";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LadderError {
    #[error("unknown rendition {0:?}")]
    Unknown(String),

    #[error("rendition {0:?} listed more than once")]
    Duplicate(String),

    #[error("at least one rendition is required")]
    Empty,
}

struct Preset {
    name: &'static str,
    resolution: &'static str,
    video_bitrate: &'static str,
    audio_bitrate: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "240p",
        resolution: RESOLUTION_240P,
        video_bitrate: VIDEO_BITRATE_240P,
        audio_bitrate: AUDIO_BITRATE_64K,
    },
    Preset {
        name: "360p",
        resolution: RESOLUTION_360P,
        video_bitrate: VIDEO_BITRATE_360P,
        audio_bitrate: AUDIO_BITRATE_96K,
    },
    Preset {
        name: "480p",
        resolution: RESOLUTION_480P,
        video_bitrate: VIDEO_BITRATE_480P,
        audio_bitrate: AUDIO_BITRATE_96K,
    },
    Preset {
        name: "720p",
        resolution: RESOLUTION_720P,
        video_bitrate: VIDEO_BITRATE_720P,
        audio_bitrate: AUDIO_BITRATE_128K,
    },
    Preset {
        name: "1080p",
        resolution: RESOLUTION_1080P,
        video_bitrate: VIDEO_BITRATE_1080P,
        audio_bitrate: AUDIO_BITRATE_192K,
    },
    Preset {
        name: "1440p",
        resolution: RESOLUTION_1440P,
        video_bitrate: VIDEO_BITRATE_1440P,
        audio_bitrate: AUDIO_BITRATE_192K,
    },
    Preset {
        name: "2160p",
        resolution: RESOLUTION_2160P,
        video_bitrate: VIDEO_BITRATE_2160P,
        audio_bitrate: AUDIO_BITRATE_256K,
    },
];

/// H.264/AAC HLS rendition for a named preset.
pub fn preset(name: &str) -> Option<SegmentOptions> {
    let preset = PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))?;

    Some(SegmentOptions {
        quality_name: preset.name.to_string(),
        segment_duration: SEGMENT_DURATION.to_string(),
        video_codec: Some(CODEC_LIBX264.to_string()),
        video_bitrate: Some(preset.video_bitrate.to_string()),
        resolution: Some(preset.resolution.to_string()),
        audio_codec: Some(CODEC_AAC.to_string()),
        audio_bitrate: Some(preset.audio_bitrate.to_string()),
        ..SegmentOptions::default()
    })
}

/// Parses a comma-separated list of preset names, keeping the given order.
pub fn parse_ladder(renditions: &str) -> Result<Vec<SegmentOptions>, LadderError> {
    let mut ladder: Vec<SegmentOptions> = Vec::new();

    for name in renditions.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let options = preset(name).ok_or_else(|| LadderError::Unknown(name.to_string()))?;
        if ladder.iter().any(|o| o.quality_name == options.quality_name) {
            return Err(LadderError::Duplicate(options.quality_name));
        }
        ladder.push(options);
    }

    if ladder.is_empty() {
        return Err(LadderError::Empty);
    }
    Ok(ladder)
}

pub fn default_ladder() -> Vec<SegmentOptions> {
    parse_ladder(DEFAULT_RENDITIONS).unwrap_or_default()
}
