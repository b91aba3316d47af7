use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future;
use futures_util::stream::BoxStream;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
    acker::Acker,
    message::Delivery,
    options::*,
    types::{AMQPValue, FieldTable},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::message::{Acknowledger, ConsumedMessage};
use super::EventPublisher;

/// Flow control for a subscription.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerOptions {
    /// Cap on unacknowledged deliveries.
    pub prefetch: u16,
    /// Declared as `x-consumer-timeout` on the group queue. Deliveries are
    /// acknowledged only after their job, so this must outlast the backlog.
    pub consumer_timeout: Option<Duration>,
}

/// Topic-exchange event bus. Routing keys are topic names; a durable queue
/// named after the consumer group gives group semantics.
#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    exchange: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMqService {
    async fn connect(url: &str, exchange: &str) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ at {}", url);
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        Self::declare_exchanges(&channel, exchange).await?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str, exchange: &str) -> Result<Self> {
        let (conn, channel) = Self::connect(url, exchange).await?;

        Ok(Self {
            url: url.to_string(),
            exchange: exchange.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    pub fn dead_letter_exchange(&self) -> String {
        dead_letter_exchange(&self.exchange)
    }

    async fn declare_exchanges(channel: &Channel, exchange: &str) -> Result<()> {
        let durable = ExchangeDeclareOptions {
            durable: true,
            ..ExchangeDeclareOptions::default()
        };

        channel
            .exchange_declare(exchange, ExchangeKind::Topic, durable, FieldTable::default())
            .await
            .map_err(|e| anyhow!("Failed to declare exchange {}: {}", exchange, e))?;

        let dlx = dead_letter_exchange(exchange);
        channel
            .exchange_declare(&dlx, ExchangeKind::Fanout, durable, FieldTable::default())
            .await
            .map_err(|e| anyhow!("Failed to declare exchange {}: {}", dlx, e))?;

        Ok(())
    }

    async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url, &self.exchange).await?;
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    async fn publish_internal(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let channel = self.channel.lock().await;

        channel
            .basic_publish(
                &self.exchange,
                topic,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_message_id(key.into()),
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed to confirm publication: {}", e))?;

        Ok(())
    }

    /// Declares the group queue with its dead-letter queue, binds it to
    /// `topics` and starts consuming on a dedicated channel.
    ///
    /// The stream ends when the broker closes the channel.
    pub async fn subscribe(
        &self,
        group: &str,
        topics: &[&str],
        options: ConsumerOptions,
    ) -> Result<BoxStream<'static, ConsumedMessage>> {
        let channel = {
            let conn = self.conn.lock().await;
            conn.create_channel()
                .await
                .map_err(|e| anyhow!("Failed to create consumer channel: {}", e))?
        };

        let durable = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };

        let dlx = self.dead_letter_exchange();
        let dead_queue = format!("{}.dead", group);
        channel
            .queue_declare(&dead_queue, durable, FieldTable::default())
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", dead_queue, e))?;
        channel
            .queue_bind(
                &dead_queue,
                &dlx,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to bind queue {}: {}", dead_queue, e))?;

        let arguments = group_queue_arguments(&dlx, options.consumer_timeout);
        channel
            .queue_declare(group, durable, arguments)
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", group, e))?;

        for topic in topics {
            channel
                .queue_bind(
                    group,
                    &self.exchange,
                    topic,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| anyhow!("Failed to bind {} to {}: {}", group, topic, e))?;
        }

        channel
            .basic_qos(options.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set prefetch: {}", e))?;

        let consumer = channel
            .basic_consume(
                group,
                &format!("{}-consumer", group),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))?;

        info!("📥 Subscribed group '{}' to {:?}", group, topics);

        let stream = consumer.filter_map(move |delivery| {
            // Holds the consumer channel open for as long as the stream lives.
            let _channel = &channel;
            future::ready(into_message(delivery))
        });

        Ok(stream.boxed())
    }
}

#[async_trait]
impl EventPublisher for RabbitMqService {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        if let Err(e) = self.publish_internal(topic, key, &payload).await {
            warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
            self.reconnect().await?;
            self.publish_internal(topic, key, &payload).await?;
        }

        Ok(())
    }
}

fn into_message(delivery: lapin::Result<Delivery>) -> Option<ConsumedMessage> {
    match delivery {
        Ok(delivery) => {
            let topic = delivery.routing_key.as_str().to_string();
            let key = delivery
                .properties
                .message_id()
                .as_ref()
                .map(|id| id.as_str().to_string());

            Some(
                ConsumedMessage::new(
                    topic,
                    key,
                    delivery.data,
                    Arc::new(DeliveryAcker(delivery.acker)),
                )
                .redelivered(delivery.redelivered),
            )
        }
        Err(e) => {
            error!("Failed to receive delivery: {}", e);
            None
        }
    }
}

struct DeliveryAcker(Acker);

#[async_trait]
impl Acknowledger for DeliveryAcker {
    async fn ack(&self) -> Result<()> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("Failed to ack message: {}", e))
    }

    async fn reject(&self) -> Result<()> {
        self.0
            .reject(BasicRejectOptions { requeue: false })
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("Failed to reject message: {}", e))
    }
}

pub fn dead_letter_exchange(exchange: &str) -> String {
    format!("{}.dlx", exchange)
}

fn group_queue_arguments(dlx: &str, consumer_timeout: Option<Duration>) -> FieldTable {
    let mut arguments = FieldTable::default();
    arguments.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(dlx.into()),
    );
    if let Some(timeout) = consumer_timeout {
        let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        arguments.insert("x-consumer-timeout".into(), AMQPValue::LongLongInt(millis));
    }
    arguments
}
