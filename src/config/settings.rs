use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::env::{self, EnvKey};
use crate::infrastructure::ffmpeg::SegmentOptions;
use crate::modules::processing::ladder::{self, LadderError};

pub const DEFAULT_BATCH_SIZE: usize = 1024;
pub const DEFAULT_PREFETCH: u16 = 8;
/// Broker-side limit on how long a delivery may stay unacknowledged.
pub const DEFAULT_CONSUMER_TIMEOUT_SECS: u64 = 6 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid MinIO endpoint {url:?}: {source}")]
    InvalidEndpoint {
        url: String,
        source: url::ParseError,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(transparent)]
    Ladder(#[from] LadderError),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub amqp_url: String,
    pub events_exchange: String,
    pub minio_url: String,
    pub minio_region: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub processed_bucket: String,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub batch_size: usize,
    pub encoder_timeout: Option<Duration>,
    pub ladder: Vec<SegmentOptions>,
    pub prefetch: u16,
    pub consumer_timeout: Option<Duration>,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let minio_url = required(EnvKey::MinioUrl)?;
        Url::parse(&minio_url).map_err(|source| ConfigError::InvalidEndpoint {
            url: minio_url.clone(),
            source,
        })?;

        let batch_size = env::get_parsed(EnvKey::BatchSize, DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(ConfigError::Zero(EnvKey::BatchSize.as_str()));
        }

        let prefetch = env::get_parsed(EnvKey::Prefetch, DEFAULT_PREFETCH);
        if prefetch == 0 {
            return Err(ConfigError::Zero(EnvKey::Prefetch.as_str()));
        }

        let timeout_secs: u64 = env::get_parsed(EnvKey::EncoderTimeout, 0);
        let consumer_timeout_secs: u64 =
            env::get_parsed(EnvKey::ConsumerTimeout, DEFAULT_CONSUMER_TIMEOUT_SECS);
        let renditions = env::get_or(EnvKey::Renditions, ladder::DEFAULT_RENDITIONS);

        Ok(Self {
            amqp_url: required(EnvKey::RabbitMqUrl)?,
            events_exchange: env::get_or(EnvKey::EventsExchange, "media.events"),
            minio_url,
            minio_region: env::get_or(EnvKey::MinioRegion, "us-east-1"),
            minio_access_key: required(EnvKey::MinioAccessKey)?,
            minio_secret_key: required(EnvKey::MinioSecretKey)?,
            processed_bucket: env::get_or(EnvKey::ProcessedBucket, "video-processed"),
            ffmpeg_path: PathBuf::from(env::get_or(EnvKey::FfmpegPath, "ffmpeg")),
            ffprobe_path: env::get_opt(EnvKey::FfprobePath).map(PathBuf::from),
            work_dir: env::get_opt(EnvKey::WorkDir)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            batch_size,
            encoder_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            ladder: ladder::parse_ladder(&renditions)?,
            prefetch,
            consumer_timeout: (consumer_timeout_secs > 0)
                .then(|| Duration::from_secs(consumer_timeout_secs)),
        })
    }

    /// Capacity of the in-process job queue.
    pub fn queue_capacity(&self) -> usize {
        self.batch_size * 2
    }

    /// Unacknowledged deliveries the broker may push, never more than the
    /// job queue holds.
    pub fn prefetch(&self) -> u16 {
        let capacity = u16::try_from(self.queue_capacity()).unwrap_or(u16::MAX);
        self.prefetch.min(capacity)
    }
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get(key).map_err(|_| ConfigError::Missing(name))
}
