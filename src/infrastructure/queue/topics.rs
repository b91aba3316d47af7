pub const VIDEO_UPLOADED: &str = "video-uploaded";
pub const VIDEO_PROGRESS_UPDATE: &str = "video-progress-update";
pub const VIDEO_PROCESSED: &str = "video-processed";

/// Consumer group of the transcoding service. Doubles as the durable queue name.
pub const VIDEO_PROCESSING_GROUP: &str = "video-processing";
