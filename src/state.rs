use std::sync::Arc;

use anyhow::Result;

use crate::common::clock::SystemClock;
use crate::config::settings::AppConfig;
use crate::infrastructure::ffmpeg::FFmpeg;
use crate::infrastructure::queue::RabbitMqService;
use crate::infrastructure::storage::StorageService;
use crate::modules::processing::{Notifier, PipelineSettings, TranscodeService};

/// Live collaborators of a running transcoder.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub queue: RabbitMqService,
    pub storage: StorageService,
    pub encoder: FFmpeg,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        queue: RabbitMqService,
        storage: StorageService,
        encoder: FFmpeg,
    ) -> Self {
        Self {
            config,
            queue,
            storage,
            encoder,
        }
    }

    pub async fn connect(config: AppConfig) -> Result<Self> {
        let queue = RabbitMqService::new(&config.amqp_url, &config.events_exchange).await?;

        let storage = StorageService::new(
            &config.minio_url,
            &config.minio_region,
            &config.minio_access_key,
            &config.minio_secret_key,
        );

        let mut encoder = FFmpeg::new(&config.ffmpeg_path).with_timeout(config.encoder_timeout);
        if let Some(probe_path) = &config.ffprobe_path {
            encoder = encoder.with_probe_path(probe_path);
        }

        Ok(Self::new(config, queue, storage, encoder))
    }

    pub fn transcode_service(&self) -> TranscodeService {
        let notifier = Notifier::new(Arc::new(self.queue.clone()), Arc::new(SystemClock));

        TranscodeService::new(
            Arc::new(self.encoder.clone()),
            Arc::new(self.storage.clone()),
            notifier,
            PipelineSettings::from_config(&self.config),
        )
    }
}
