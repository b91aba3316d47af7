//! Argument vectors for the encoder and the prober.

use std::path::Path;

use super::constants::{CODEC_LIBX264, FORMAT_HLS, PRESET_MEDIUM};
use super::types::SegmentOptions;

pub fn version_args() -> Vec<String> {
    vec!["-version".to_string()]
}

pub fn probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path_arg(input),
    ]
}

/// Builds the arguments that segment `input` into a single HLS rendition
/// rooted at `output_dir`.
pub fn segment_args(input: &Path, output_dir: &Path, options: &SegmentOptions) -> Vec<String> {
    let mut args = vec!["-y".to_string(), "-i".to_string(), path_arg(input)];

    if let Some(codec) = &options.video_codec {
        push(&mut args, "-c:v", codec);
    }

    // Bitrate and CRF are mutually exclusive; bitrate wins.
    if let Some(bitrate) = &options.video_bitrate {
        push(&mut args, "-b:v", bitrate);
        if options.video_codec.as_deref() == Some(CODEC_LIBX264) {
            push(&mut args, "-preset", PRESET_MEDIUM);
        }
    } else if let Some(quality) = &options.video_quality {
        push(&mut args, "-crf", quality);
    }

    // A scale filter instead of `-s` keeps the sample aspect ratio sane.
    if let Some(filter) = options.resolution.as_deref().and_then(scale_filter) {
        push(&mut args, "-vf", &filter);
    }

    if let Some(rate) = &options.frame_rate {
        push(&mut args, "-r", rate);
    }
    if let Some(codec) = &options.audio_codec {
        push(&mut args, "-c:a", codec);
    }
    if let Some(bitrate) = &options.audio_bitrate {
        push(&mut args, "-b:a", bitrate);
    }
    if let Some(channels) = &options.audio_channels {
        push(&mut args, "-ac", channels);
    }
    if let Some(rate) = &options.audio_sample_rate {
        push(&mut args, "-ar", rate);
    }

    push(&mut args, "-f", FORMAT_HLS);
    push(&mut args, "-hls_time", &options.segment_duration);
    push(&mut args, "-hls_playlist_type", &options.playlist_type);

    let segment_pattern = format!("{}_%03d.{}", options.segment_prefix, options.segment_format);
    push(
        &mut args,
        "-hls_segment_filename",
        &path_arg(&output_dir.join(segment_pattern)),
    );

    if let Some(key_info) = &options.key_info_file {
        push(&mut args, "-hls_key_info_file", &path_arg(key_info));
    }

    args.extend(options.custom_args.iter().cloned());
    args.push(path_arg(&output_dir.join(&options.playlist_name)));
    args
}

/// Builds the arguments that extract one frame at `time_offset`.
pub fn thumbnail_args(
    input: &Path,
    output: &Path,
    time_offset: &str,
    size: Option<(u32, u32)>,
) -> Vec<String> {
    let mut args = vec!["-y".to_string(), "-i".to_string(), path_arg(input)];
    push(&mut args, "-ss", time_offset);
    push(&mut args, "-vframes", "1");
    args.push("-an".to_string());

    if let Some((width, height)) = size.filter(|(w, h)| *w > 0 && *h > 0) {
        push(&mut args, "-s", &format!("{width}x{height}"));
    }

    args.push(path_arg(output));
    args
}

/// `"1280x720"` -> `"scale=1280:720"`.
pub fn scale_filter(resolution: &str) -> Option<String> {
    let mut parts = resolution.split('x').map(str::trim);
    let (width, height) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || width.is_empty() || height.is_empty() {
        return None;
    }
    Some(format!("scale={width}:{height}"))
}

fn push(args: &mut Vec<String>, flag: &str, value: &str) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
