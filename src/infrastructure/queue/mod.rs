use anyhow::Result;
use async_trait::async_trait;

pub mod message;
pub mod rabbitmq;
pub mod topics;

pub use message::{Acknowledger, ConsumedMessage};
pub use rabbitmq::{ConsumerOptions, RabbitMqService};

/// Publishes a payload on a topic of the events exchange.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()>;
}
