//! # Producer Gateway
//!
//! Publishes outbound process events. The broker producer is created on the first
//! publish under a FIFO mutex, so concurrent first publishers end up sharing one
//! producer; a failed creation leaves the slot empty and the next publish retries.
//!
//! ## Send modes
//!
//! - [`PublishMode::Async`]: the acknowledgement is awaited on a spawned task and
//!   failures are only logged
//! - [`PublishMode::Sync`]: the caller waits for the acknowledgement and receives a
//!   [`PublishError`] on failure, with interruption kept distinct from broker
//!   rejection

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::codec::{CodecError, CodecFactory};
use crate::config::PublishMode;
use crate::messaging::{
    BrokerClientFactory, BrokerError, BrokerProducer, ProducerRecord, ProducerSettings,
    RecordMetadata,
};
use crate::models::OutboundEvent;
use crate::registration::TopicResolver;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Publish to {topic} was interrupted before the broker acknowledged it")]
    Interrupted { topic: String },

    #[error("Broker rejected publish: {0}")]
    Broker(BrokerError),

    #[error("Failed to encode event: {0}")]
    Encoding(#[from] CodecError),

    #[error("Producer unavailable: {0}")]
    ProducerUnavailable(BrokerError),

    #[error("Producer gateway is shut down")]
    ShutDown,
}

impl PublishError {
    fn from_delivery(error: BrokerError) -> Self {
        match error {
            BrokerError::DeliveryInterrupted { topic } => Self::Interrupted { topic },
            other => Self::Broker(other),
        }
    }
}

/// Outcome of a publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Sync mode: the broker acknowledged the record
    Acknowledged(RecordMetadata),
    /// Async mode: the record was handed to the producer
    Dispatched { topic: String },
    /// Async mode: the event could not be encoded and was dropped
    Dropped { topic: String },
}

pub struct ProducerGateway {
    factory: Arc<dyn BrokerClientFactory>,
    settings: ProducerSettings,
    codecs: Arc<CodecFactory>,
    topics: TopicResolver,
    mode: PublishMode,
    close_timeout: Duration,
    producer: Mutex<Option<Arc<dyn BrokerProducer>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for ProducerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerGateway")
            .field("provider", &self.factory.provider_name())
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ProducerGateway {
    pub fn new(
        factory: Arc<dyn BrokerClientFactory>,
        settings: ProducerSettings,
        codecs: Arc<CodecFactory>,
        topics: TopicResolver,
        mode: PublishMode,
        close_timeout: Duration,
    ) -> Self {
        Self {
            factory,
            settings,
            codecs,
            topics,
            mode,
            close_timeout,
            producer: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> PublishMode {
        self.mode
    }

    async fn producer(&self) -> Result<Arc<dyn BrokerProducer>, PublishError> {
        let mut slot = self.producer.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::ShutDown);
        }
        if let Some(producer) = slot.as_ref() {
            return Ok(producer.clone());
        }

        let producer = self
            .factory
            .create_producer(&self.settings)
            .map_err(|e| {
                error!(
                    provider = self.factory.provider_name(),
                    error = %e,
                    "❌ PRODUCER: Failed to create broker producer - will retry on next publish"
                );
                PublishError::ProducerUnavailable(e)
            })?;
        info!(
            provider = self.factory.provider_name(),
            bootstrap_servers = %self.settings.bootstrap_servers,
            "✅ PRODUCER: Broker producer created"
        );
        *slot = Some(producer.clone());
        Ok(producer)
    }

    /// Encode and publish one event to the topic derived from its name
    pub async fn publish(&self, event: OutboundEvent) -> Result<PublishOutcome, PublishError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::ShutDown);
        }
        let topic = self.topics.topic_for(&event.name);
        let producer = self.producer().await?;

        let value = match self.codecs.writer_for(&topic).write_event(&event) {
            Ok(value) => value,
            Err(e) if self.mode == PublishMode::Async => {
                warn!(topic = %topic, error = %e, "Dropping outbound event that failed to encode");
                return Ok(PublishOutcome::Dropped { topic });
            }
            Err(e) => return Err(e.into()),
        };
        let record =
            ProducerRecord::new(topic.clone(), value).with_key(event.process_instance_id.to_string());

        match self.mode {
            PublishMode::Sync => {
                let receipt = producer.send(record).await.map_err(PublishError::Broker)?;
                let metadata = receipt.wait().await.map_err(PublishError::from_delivery)?;
                debug!(topic = %metadata.topic, offset = metadata.offset, "Outbound event acknowledged");
                Ok(PublishOutcome::Acknowledged(metadata))
            }
            PublishMode::Async => {
                match producer.send(record).await {
                    Ok(receipt) => {
                        tokio::spawn(async move {
                            match receipt.wait().await {
                                Ok(metadata) => debug!(
                                    topic = %metadata.topic,
                                    offset = metadata.offset,
                                    "Outbound event acknowledged"
                                ),
                                Err(e) => error!(error = %e, "❌ PRODUCER: Outbound event was not delivered"),
                            }
                        });
                    }
                    Err(e) => {
                        error!(topic = %topic, error = %e, "❌ PRODUCER: Failed to hand outbound event to producer");
                    }
                }
                Ok(PublishOutcome::Dispatched { topic })
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reject further publishes and close the producer, if one was created
    pub async fn close(&self) {
        let mut slot = self.producer.lock().await;
        self.closed.store(true, Ordering::Release);
        if let Some(producer) = slot.take() {
            if let Err(e) = producer.close(self.close_timeout).await {
                warn!(error = %e, "Broker producer did not close cleanly");
            }
            info!("🛑 PRODUCER: Broker producer closed");
        }
    }
}
