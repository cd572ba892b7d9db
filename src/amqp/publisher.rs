//! AMQP event publisher for outbound domain events

use crate::amqp::messages::{
    MessageEnvelope, GAME_CREATED_ROUTING_KEY, GAME_ENDED_ROUTING_KEY, GAME_EVENTS_EXCHANGE,
    MOVE_APPROVED_ROUTING_KEY,
};
use crate::error::{OrchestrationError, Result};
use crate::types::{GameCreated, GameEnded, GameMoveApproved};
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for publishing orchestration events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a GameCreated event
    async fn publish_game_created(&self, event: GameCreated) -> Result<()>;

    /// Publish a GameMoveApproved event
    async fn publish_move_approved(&self, event: GameMoveApproved) -> Result<()>;

    /// Publish a GameEnded event
    async fn publish_game_ended(&self, event: GameEnded) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

/// AMQP-based event publisher implementation
pub struct AmqpEventPublisher {
    channel: Channel,
    config: PublisherConfig,
}

impl AmqpEventPublisher {
    /// Create a new event publisher and declare the game-events exchange
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self { channel, config };
        publisher.setup_exchange().await?;
        Ok(publisher)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(GAME_EVENTS_EXCHANGE, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            OrchestrationError::AmqpConnectionFailed {
                message: format!("failed to declare game events exchange: {}", e),
            }
        })?;

        info!("Declared AMQP exchange '{}'", GAME_EVENTS_EXCHANGE);
        Ok(())
    }

    /// Publish an envelope with bounded retry and exponential backoff
    async fn publish_with_retry<T>(&self, envelope: &MessageEnvelope<T>) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(()) => {
                    debug!(
                        "Published message {} with routing key {}",
                        envelope.correlation_id, envelope.routing_key
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    async fn try_publish<T>(&self, envelope: &MessageEnvelope<T>) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(GAME_EVENTS_EXCHANGE, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| OrchestrationError::AmqpConnectionFailed {
                message: format!("failed to publish message: {}", e),
            })?;

        Ok(())
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_game_created(&self, event: GameCreated) -> Result<()> {
        let envelope = MessageEnvelope::new(event, GAME_CREATED_ROUTING_KEY.to_string());
        self.publish_with_retry(&envelope).await
    }

    async fn publish_move_approved(&self, event: GameMoveApproved) -> Result<()> {
        let envelope = MessageEnvelope::new(event, MOVE_APPROVED_ROUTING_KEY.to_string());
        self.publish_with_retry(&envelope).await
    }

    async fn publish_game_ended(&self, event: GameEnded) -> Result<()> {
        let envelope = MessageEnvelope::new(event, GAME_ENDED_ROUTING_KEY.to_string());
        self.publish_with_retry(&envelope).await
    }
}

/// Mock event publisher recording every event, for tests
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    created: std::sync::Mutex<Vec<GameCreated>>,
    approved: std::sync::Mutex<Vec<GameMoveApproved>>,
    ended: std::sync::Mutex<Vec<GameEnded>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_events(&self) -> Vec<GameCreated> {
        self.created.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn approved_events(&self) -> Vec<GameMoveApproved> {
        self.approved.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn ended_events(&self) -> Vec<GameEnded> {
        self.ended.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        self.created.lock().map(|mut e| e.clear()).ok();
        self.approved.lock().map(|mut e| e.clear()).ok();
        self.ended.lock().map(|mut e| e.clear()).ok();
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_game_created(&self, event: GameCreated) -> Result<()> {
        if let Ok(mut events) = self.created.lock() {
            events.push(event);
        }
        Ok(())
    }

    async fn publish_move_approved(&self, event: GameMoveApproved) -> Result<()> {
        if let Ok(mut events) = self.approved.lock() {
            events.push(event);
        }
        Ok(())
    }

    async fn publish_game_ended(&self, event: GameEnded) -> Result<()> {
        if let Ok(mut events) = self.ended.lock() {
            events.push(event);
        }
        Ok(())
    }
}
