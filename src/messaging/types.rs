//! # Broker Client Types
//!
//! Records, delivery receipts and client settings shared by every broker provider.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::BrokerError;

/// A record received from a subscribed topic
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub value: Vec<u8>,
    pub headers: BTreeMap<String, Vec<u8>>,
    pub timestamp: DateTime<Utc>,
}

impl BrokerRecord {
    /// Header value decoded as UTF-8, if present and valid
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| std::str::from_utf8(value).ok())
    }
}

/// A record handed to a producer for publication
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerRecord {
    pub topic: String,
    pub key: Option<String>,
    pub value: Vec<u8>,
    pub headers: BTreeMap<String, Vec<u8>>,
}

impl ProducerRecord {
    pub fn new(topic: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            value,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Broker acknowledgement for a published record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Pending acknowledgement of a sent record
///
/// Resolves once the broker acknowledges or rejects the record. A receipt whose
/// sending side is dropped before completion resolves to
/// [`BrokerError::DeliveryInterrupted`].
#[derive(Debug)]
pub struct DeliveryReceipt {
    topic: String,
    receiver: oneshot::Receiver<Result<RecordMetadata, BrokerError>>,
}

impl DeliveryReceipt {
    /// Create a receipt and the sender the provider completes it with
    pub fn channel(
        topic: impl Into<String>,
    ) -> (oneshot::Sender<Result<RecordMetadata, BrokerError>>, Self) {
        let (sender, receiver) = oneshot::channel();
        (
            sender,
            Self {
                topic: topic.into(),
                receiver,
            },
        )
    }

    /// A receipt that is already resolved
    pub fn completed(topic: impl Into<String>, result: Result<RecordMetadata, BrokerError>) -> Self {
        let (sender, receipt) = Self::channel(topic);
        // The receiver is held by `receipt`, so this send cannot fail
        let _ = sender.send(result);
        receipt
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the broker's verdict
    pub async fn wait(self) -> Result<RecordMetadata, BrokerError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::delivery_interrupted(self.topic)),
        }
    }
}

/// Consumer transaction isolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    ReadUncommitted,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::ReadUncommitted => "read_uncommitted",
        }
    }
}

/// Settings a provider needs to build a consumer
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerSettings {
    pub bootstrap_servers: String,
    pub client_id: Option<String>,
    pub group_id: String,
    pub isolation_level: IsolationLevel,
    /// `None` leaves the broker default in place
    pub allow_auto_create_topics: Option<bool>,
}

/// Settings a provider needs to build a producer
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerSettings {
    pub bootstrap_servers: String,
    pub client_id: Option<String>,
    pub acks: Option<String>,
    pub max_block: Duration,
}
