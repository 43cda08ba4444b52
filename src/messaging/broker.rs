//! # Broker Client Traits
//!
//! Provider-agnostic seams for the broker consumer and producer. The bridge owns
//! exactly one consumer and one producer and creates both lazily through a
//! [`BrokerClientFactory`], so a failed creation is simply retried on the next
//! registration or publish request.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{BrokerRecord, ConsumerSettings, DeliveryReceipt, ProducerRecord, ProducerSettings};
use super::BrokerError;

/// Topic-subscribing consumer bound to a consumer group
///
/// `poll` must be cancel-safe: the coordinator interrupts an in-flight poll by
/// dropping its future, and no record may be lost or skipped when that happens.
#[async_trait]
pub trait BrokerConsumer: Send + 'static {
    /// Replace the current subscription with `topics`
    async fn subscribe(&mut self, topics: &BTreeSet<String>) -> Result<(), BrokerError>;

    /// Drop every subscription
    async fn unsubscribe(&mut self) -> Result<(), BrokerError>;

    /// Topics currently subscribed
    fn subscription(&self) -> BTreeSet<String>;

    /// Wait up to `timeout` for records on the subscribed topics
    ///
    /// Records of one topic are returned in broker order. An empty vector means the
    /// timeout elapsed without new records.
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<BrokerRecord>, BrokerError>;

    /// Release the consumer, committing whatever the provider tracks
    async fn close(&mut self, timeout: Duration) -> Result<(), BrokerError>;
}

/// Record publisher
#[async_trait]
pub trait BrokerProducer: Send + Sync + 'static {
    /// Hand a record to the broker client
    ///
    /// Returns once the record is accepted for sending; the returned receipt resolves
    /// when the broker acknowledges it.
    async fn send(&self, record: ProducerRecord) -> Result<DeliveryReceipt, BrokerError>;

    /// Flush pending records and release the producer
    async fn close(&self, timeout: Duration) -> Result<(), BrokerError>;
}

/// Creates broker clients from settings
pub trait BrokerClientFactory: Send + Sync + 'static {
    fn create_consumer(
        &self,
        settings: &ConsumerSettings,
    ) -> Result<Box<dyn BrokerConsumer>, BrokerError>;

    fn create_producer(
        &self,
        settings: &ProducerSettings,
    ) -> Result<Arc<dyn BrokerProducer>, BrokerError>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}
