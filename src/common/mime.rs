use std::path::Path;

use crate::infrastructure::ffmpeg::constants::*;

/// MIME type for an artifact, looked up by lowercase extension.
pub fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        EXT_M3U8 => MIME_M3U8,
        EXT_TS => MIME_TS,
        EXT_MP4 => MIME_MP4,
        EXT_JPG | EXT_JPEG => MIME_JPEG,
        EXT_PNG => MIME_PNG,
        EXT_MKV => MIME_MKV,
        EXT_WEBM => MIME_WEBM,
        EXT_AVI => MIME_AVI,
        EXT_MOV => MIME_MOV,
        EXT_FLV => MIME_FLV,
        _ => MIME_OCTET_STREAM,
    }
}
