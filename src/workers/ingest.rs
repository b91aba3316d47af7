//! Broker-facing half of the pipeline: filters deliveries and feeds the
//! bounded job queue.

use async_channel::{Receiver, Sender};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infrastructure::queue::ConsumedMessage;

/// A delivery waiting for the transcoder, with the scope it was received under.
#[derive(Debug)]
pub struct QueuedJob {
    pub scope: CancellationToken,
    pub message: ConsumedMessage,
}

/// Bounded FIFO of `2 * batch_size` slots. A full queue blocks the producer.
pub fn job_queue(batch_size: usize) -> (Sender<QueuedJob>, Receiver<QueuedJob>) {
    async_channel::bounded(batch_size.max(1) * 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Enqueued,
    /// Wrong topic; acknowledged and dropped.
    Ignored,
    /// Scope cancelled or queue closed before a slot freed up. Left
    /// unacknowledged for redelivery.
    Abandoned,
}

pub struct IngestionConsumer {
    topic: String,
    queue: Sender<QueuedJob>,
}

impl IngestionConsumer {
    pub fn new(topic: impl Into<String>, queue: Sender<QueuedJob>) -> Self {
        Self {
            topic: topic.into(),
            queue,
        }
    }

    pub async fn dispatch(&self, scope: &CancellationToken, message: ConsumedMessage) -> Dispatch {
        info!(
            topic = %message.topic,
            key = message.key.as_deref().unwrap_or_default(),
            redelivered = message.redelivered,
            "received message: {}",
            message.value_as_string()
        );

        if message.topic != self.topic {
            debug!("Ignoring message on topic {}", message.topic);
            if let Err(e) = message.ack().await {
                warn!("Failed to ack ignored message: {:#}", e);
            }
            return Dispatch::Ignored;
        }

        let job = QueuedJob {
            scope: scope.clone(),
            message,
        };

        tokio::select! {
            biased;
            _ = scope.cancelled() => Dispatch::Abandoned,
            sent = self.queue.send(job) => match sent {
                Ok(()) => Dispatch::Enqueued,
                Err(_) => Dispatch::Abandoned,
            },
        }
    }

    /// Feeds `messages` into the queue until the scope is cancelled or the
    /// stream ends, then closes the queue.
    pub async fn run<S>(&self, scope: CancellationToken, messages: S)
    where
        S: Stream<Item = ConsumedMessage> + Unpin,
    {
        let mut messages = messages;
        info!("📥 Ingestion consumer listening on '{}'", self.topic);

        loop {
            let message = tokio::select! {
                biased;
                _ = scope.cancelled() => break,
                next = messages.next() => match next {
                    Some(message) => message,
                    None => {
                        warn!("Delivery stream ended");
                        break;
                    }
                },
            };

            if self.dispatch(&scope, message).await == Dispatch::Abandoned {
                break;
            }
        }

        self.queue.close();
        info!("📥 Ingestion consumer stopped");
    }
}
