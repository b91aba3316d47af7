use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};
use uuid::Uuid;

use super::events::{ProcessedPayload, ProgressEvent, VideoProcessed, VideoStatus};
use crate::common::clock::Clock;
use crate::infrastructure::queue::EventPublisher;
use crate::infrastructure::queue::topics::{VIDEO_PROCESSED, VIDEO_PROGRESS_UPDATE};

/// Outbound job notifications, keyed by video id.
#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    async fn publish_progress(&self, event: &ProgressEvent) -> Result<()>;

    async fn publish_processed(&self, event: &VideoProcessed) -> Result<()>;
}

#[async_trait]
impl<P> ProgressPublisher for P
where
    P: EventPublisher + ?Sized,
{
    async fn publish_progress(&self, event: &ProgressEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.publish(VIDEO_PROGRESS_UPDATE, &event.video_id.to_string(), payload)
            .await
    }

    async fn publish_processed(&self, event: &VideoProcessed) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.publish(VIDEO_PROCESSED, &event.video_id.to_string(), payload)
            .await
    }
}

/// Best-effort wrapper: failures are logged and never fail the job.
#[derive(Clone)]
pub struct Notifier {
    publisher: Arc<dyn ProgressPublisher>,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn ProgressPublisher>, clock: Arc<dyn Clock>) -> Self {
        Self { publisher, clock }
    }

    pub async fn status(&self, video_id: Uuid, status: VideoStatus, object_key: &str) {
        let event = ProgressEvent {
            video_id,
            status,
            object_key: object_key.to_string(),
            processed_at: self.clock.now(),
        };

        match self.publisher.publish_progress(&event).await {
            Ok(()) => info!("📣 Published {:?} status for {}", status, video_id),
            Err(e) => error!("Failed to publish video progress update message: {:#}", e),
        }
    }

    pub async fn processed(&self, video_id: Uuid, object_key: &str, payload: ProcessedPayload) {
        let event = VideoProcessed {
            video_id,
            object_key: object_key.to_string(),
            payload,
        };

        if let Err(e) = self.publisher.publish_processed(&event).await {
            error!("Failed to publish processed artifact message for {}: {:#}", object_key, e);
        }
    }
}
