// Codecs
pub const CODEC_LIBX264: &str = "libx264";
pub const CODEC_AAC: &str = "aac";

// Container formats
pub const FORMAT_HLS: &str = "hls";

// File extensions (without the leading dot)
pub const EXT_M3U8: &str = "m3u8";
pub const EXT_TS: &str = "ts";
pub const EXT_MP4: &str = "mp4";
pub const EXT_JPG: &str = "jpg";
pub const EXT_JPEG: &str = "jpeg";
pub const EXT_PNG: &str = "png";
pub const EXT_MKV: &str = "mkv";
pub const EXT_WEBM: &str = "webm";
pub const EXT_AVI: &str = "avi";
pub const EXT_MOV: &str = "mov";
pub const EXT_FLV: &str = "flv";

// MIME types
pub const MIME_MP4: &str = "video/mp4";
pub const MIME_MKV: &str = "video/x-matroska";
pub const MIME_WEBM: &str = "video/webm";
pub const MIME_AVI: &str = "video/x-msvideo";
pub const MIME_MOV: &str = "video/quicktime";
pub const MIME_FLV: &str = "video/x-flv";
pub const MIME_TS: &str = "video/mp2t";
pub const MIME_M3U8: &str = "application/vnd.apple.mpegurl";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

// HLS playlist settings
pub const PLAYLIST_TYPE_VOD: &str = "vod";
pub const DEFAULT_PLAYLIST_NAME: &str = "playlist.m3u8";
pub const MASTER_PLAYLIST_NAME: &str = "master.m3u8";
pub const DEFAULT_SEGMENT_PREFIX: &str = "segment";
pub const DEFAULT_SEGMENT_FORMAT: &str = "ts";
pub const DEFAULT_SEGMENT_DURATION: &str = "10";

pub const PRESET_MEDIUM: &str = "medium";

// Standard resolutions
pub const RESOLUTION_240P: &str = "426x240";
pub const RESOLUTION_360P: &str = "640x360";
pub const RESOLUTION_480P: &str = "854x480";
pub const RESOLUTION_720P: &str = "1280x720";
pub const RESOLUTION_1080P: &str = "1920x1080";
pub const RESOLUTION_1440P: &str = "2560x1440";
pub const RESOLUTION_2160P: &str = "3840x2160";

// Standard video bitrates
pub const VIDEO_BITRATE_240P: &str = "300k";
pub const VIDEO_BITRATE_360P: &str = "500k";
pub const VIDEO_BITRATE_480P: &str = "800k";
pub const VIDEO_BITRATE_720P: &str = "1400k";
pub const VIDEO_BITRATE_1080P: &str = "2800k";
pub const VIDEO_BITRATE_1440P: &str = "5000k";
pub const VIDEO_BITRATE_2160P: &str = "8000k";

// Standard audio bitrates
pub const AUDIO_BITRATE_64K: &str = "64k";
pub const AUDIO_BITRATE_96K: &str = "96k";
pub const AUDIO_BITRATE_128K: &str = "128k";
pub const AUDIO_BITRATE_192K: &str = "192k";
pub const AUDIO_BITRATE_256K: &str = "256k";
