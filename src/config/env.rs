use std::env;
use std::str::FromStr;

pub enum EnvKey {
    RabbitMqUrl,
    EventsExchange,
    MinioUrl,
    MinioRegion,
    MinioAccessKey,
    MinioSecretKey,
    ProcessedBucket,
    FfmpegPath,
    FfprobePath,
    WorkDir,
    BatchSize,
    EncoderTimeout,
    Renditions,
    Prefetch,
    ConsumerTimeout,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::EventsExchange => "EVENTS_EXCHANGE",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioRegion => "AWS_REGION",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::ProcessedBucket => "MINIO_BUCKET_PROCESSED",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::WorkDir => "TRANSCODER_WORK_DIR",
            EnvKey::BatchSize => "TRANSCODER_BATCH_SIZE",
            EnvKey::EncoderTimeout => "ENCODER_TIMEOUT_SECS",
            EnvKey::Renditions => "TRANSCODER_RENDITIONS",
            EnvKey::Prefetch => "TRANSCODER_PREFETCH",
            EnvKey::ConsumerTimeout => "RABBITMQ_CONSUMER_TIMEOUT_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
