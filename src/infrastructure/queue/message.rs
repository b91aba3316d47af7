use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Settles a delivered message with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<()>;

    /// Rejects without requeueing; the broker dead-letters the message.
    async fn reject(&self) -> Result<()>;
}

/// A message delivered to a subscriber, still awaiting settlement.
#[derive(Clone)]
pub struct ConsumedMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Bytes,
    pub redelivered: bool,
    acker: Arc<dyn Acknowledger>,
}

impl ConsumedMessage {
    pub fn new(
        topic: impl Into<String>,
        key: Option<String>,
        payload: impl Into<Bytes>,
        acker: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            topic: topic.into(),
            key,
            payload: payload.into(),
            redelivered: false,
            acker,
        }
    }

    pub fn redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    pub fn value_as_string(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    pub async fn ack(&self) -> Result<()> {
        self.acker.ack().await
    }

    pub async fn reject(&self) -> Result<()> {
        self.acker.reject().await
    }
}

impl fmt::Debug for ConsumedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumedMessage")
            .field("topic", &self.topic)
            .field("key", &self.key)
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}
