//! Fact consumption plumbing
//!
//! Each queue subscription decodes deliveries into `Fact`s and forwards them
//! into an mpsc channel. One dedicated worker task drains each channel and
//! invokes the dispatcher synchronously and sequentially — all game facts
//! for this instance funnel through a single worker, which is what makes
//! concurrent moves on the same game impossible within one instance.

use crate::amqp::messages::decode_fact;
use crate::error::{OrchestrationError, Result};
use crate::service::GameService;
use crate::types::Fact;
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Consumer for one queue subscription, forwarding decoded facts
pub struct FactConsumer {
    channel: Channel,
    consumer_tag: String,
    fact_tx: mpsc::Sender<Fact>,
}

impl FactConsumer {
    /// Create a new fact consumer feeding the given channel
    pub fn new(channel: Channel, fact_tx: mpsc::Sender<Fact>) -> Self {
        let consumer_tag = format!("fact-consumer-{}", uuid::Uuid::new_v4());
        Self {
            channel,
            consumer_tag,
            fact_tx,
        }
    }

    /// Start consuming messages from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(FactForwarder::new(self.fact_tx.clone()), args)
            .await
            .map_err(|e| OrchestrationError::AmqpConnectionFailed {
                message: format!("failed to start consuming: {}", e),
            })?;

        info!("Started consuming facts from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel.basic_cancel(args).await.map_err(|e| {
            OrchestrationError::AmqpConnectionFailed {
                message: format!("failed to stop consuming: {}", e),
            }
        })?;

        info!("Stopped consuming facts");
        Ok(())
    }
}

/// Internal consumer implementation decoding deliveries into facts
struct FactForwarder {
    fact_tx: mpsc::Sender<Fact>,
}

impl FactForwarder {
    fn new(fact_tx: mpsc::Sender<Fact>) -> Self {
        Self { fact_tx }
    }
}

#[async_trait]
impl AsyncConsumer for FactForwarder {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let routing_key = deliver.routing_key();

        match decode_fact(routing_key, &content) {
            Ok(Some(fact)) => {
                debug!(
                    "Fact received - routing_key: '{}', size: {} bytes",
                    routing_key,
                    content.len()
                );
                if self.fact_tx.send(fact).await.is_err() {
                    warn!("Fact worker is gone; dropping delivery '{}'", routing_key);
                }
            }
            Ok(None) => {
                debug!("Ignoring delivery with unknown routing key '{}'", routing_key);
            }
            Err(e) => {
                // Malformed transport input is dropped, never propagated
                warn!(
                    "Dropping malformed delivery - routing_key: '{}', error: {}",
                    routing_key, e
                );
            }
        }
    }
}

/// Spawn the dedicated worker draining one subscription's facts. The worker
/// invokes the dispatcher sequentially; handler errors are logged and the
/// next fact is processed.
pub fn spawn_fact_worker(
    name: &'static str,
    mut fact_rx: mpsc::Receiver<Fact>,
    service: Arc<GameService>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Fact worker '{}' started", name);

        while let Some(fact) = fact_rx.recv().await {
            if let Err(e) = service.handle_fact(fact).await {
                error!("Fact worker '{}' handler error: {}", name, e);
            }
        }

        info!("Fact worker '{}' stopped", name);
    })
}
