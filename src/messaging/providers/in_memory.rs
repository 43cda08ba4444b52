//! # In-Memory Broker
//!
//! Thread-safe in-memory publish/subscribe broker for testing and development.
//!
//! ## Features
//!
//! - **Topic logs**: every topic is a single ordered partition (partition 0)
//! - **Consumer groups**: committed offsets are tracked per (group, topic); a group
//!   without a committed offset starts from the earliest record
//! - **Cancel-safe polling**: records are claimed atomically, so dropping a poll
//!   future never loses a record
//! - **Failure injection**: client creation, broker-side send rejection and
//!   interrupted acknowledgements can be simulated

use std::collections::{BTreeSet, HashMap};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::messaging::broker::{BrokerClientFactory, BrokerConsumer, BrokerProducer};
use crate::messaging::types::{
    BrokerRecord, ConsumerSettings, DeliveryReceipt, ProducerRecord, ProducerSettings,
    RecordMetadata,
};
use crate::messaging::BrokerError;

/// Upper bound of records returned by one poll
const MAX_POLL_RECORDS: usize = 500;

#[derive(Debug)]
struct ConsumerEntry {
    group: String,
    subscription: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct BrokerState {
    /// Topic logs (topic -> records in offset order)
    topics: HashMap<String, Vec<BrokerRecord>>,
    /// Next offset to deliver per (group, topic)
    group_offsets: HashMap<(String, String), usize>,
    /// Open consumers by client id
    consumers: HashMap<u64, ConsumerEntry>,
    next_client_id: u64,
    consumers_created: usize,
    producers_created: usize,
    last_consumer_settings: Option<ConsumerSettings>,
    fail_next_consumer: bool,
    fail_next_producer: bool,
    reject_sends: bool,
    interrupt_deliveries: bool,
}

impl BrokerState {
    fn append(&mut self, record: ProducerRecord) -> RecordMetadata {
        let log = self.topics.entry(record.topic.clone()).or_default();
        let offset = log.len() as i64;
        log.push(BrokerRecord {
            topic: record.topic.clone(),
            partition: 0,
            offset,
            key: record.key,
            value: record.value,
            headers: record.headers,
            timestamp: Utc::now(),
        });
        RecordMetadata {
            topic: record.topic,
            partition: 0,
            offset,
        }
    }

    /// Claim every undelivered record of `topics` for `group`
    fn claim(&mut self, group: &str, topics: &BTreeSet<String>) -> Vec<BrokerRecord> {
        let mut claimed = Vec::new();
        for topic in topics {
            let Some(log) = self.topics.get(topic) else {
                continue;
            };
            let next = self
                .group_offsets
                .entry((group.to_string(), topic.clone()))
                .or_insert(0);
            let remaining = MAX_POLL_RECORDS.saturating_sub(claimed.len());
            let end = log.len().min(*next + remaining);
            if *next < end {
                claimed.extend_from_slice(&log[*next..end]);
                *next = end;
            }
            if claimed.len() >= MAX_POLL_RECORDS {
                break;
            }
        }
        claimed
    }
}

#[derive(Debug, Default)]
struct BrokerShared {
    state: Mutex<BrokerState>,
    arrivals: Notify,
}

/// In-memory broker and broker client factory
///
/// Cloning yields another handle on the same broker, so a test can keep one handle
/// while the bridge owns the factory.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeSet;
/// use std::time::Duration;
/// use tasker_event_bridge::messaging::{BrokerClientFactory, ConsumerSettings, InMemoryBroker, IsolationLevel};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = InMemoryBroker::new();
/// broker.publish("orders", br#"{"id":"1","type":"t","source":"s","data":1}"#.to_vec());
///
/// let mut consumer = broker.create_consumer(&ConsumerSettings {
///     bootstrap_servers: "memory".to_string(),
///     client_id: None,
///     group_id: "group".to_string(),
///     isolation_level: IsolationLevel::ReadCommitted,
///     allow_auto_create_topics: None,
/// })?;
/// consumer.subscribe(&BTreeSet::from(["orders".to_string()])).await?;
/// let records = consumer.poll(Duration::from_millis(100)).await?;
/// assert_eq!(records.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<BrokerShared>,
}

impl InMemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to `topic` and wake polling consumers
    pub fn publish(&self, topic: &str, value: Vec<u8>) -> RecordMetadata {
        self.publish_record(ProducerRecord::new(topic, value))
    }

    /// Append a fully specified record and wake polling consumers
    pub fn publish_record(&self, record: ProducerRecord) -> RecordMetadata {
        let metadata = self.shared.state.lock().append(record);
        self.shared.arrivals.notify_waiters();
        trace!(topic = %metadata.topic, offset = metadata.offset, "In-memory record appended");
        metadata
    }

    /// All records appended to `topic` (for testing)
    pub fn records(&self, topic: &str) -> Vec<BrokerRecord> {
        self.shared
            .state
            .lock()
            .topics
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Union of the subscriptions of every open consumer (for testing)
    pub fn subscribed_topics(&self) -> BTreeSet<String> {
        self.shared
            .state
            .lock()
            .consumers
            .values()
            .flat_map(|entry| entry.subscription.iter().cloned())
            .collect()
    }

    /// Number of consumers created and not yet closed
    pub fn open_consumers(&self) -> usize {
        self.shared.state.lock().consumers.len()
    }

    pub fn consumers_created(&self) -> usize {
        self.shared.state.lock().consumers_created
    }

    pub fn producers_created(&self) -> usize {
        self.shared.state.lock().producers_created
    }

    /// Settings passed to the most recent successful consumer creation
    pub fn last_consumer_settings(&self) -> Option<ConsumerSettings> {
        self.shared.state.lock().last_consumer_settings.clone()
    }

    /// Make the next consumer creation fail
    pub fn fail_next_consumer_creation(&self) {
        self.shared.state.lock().fail_next_consumer = true;
    }

    /// Make the next producer creation fail
    pub fn fail_next_producer_creation(&self) {
        self.shared.state.lock().fail_next_producer = true;
    }

    /// Reject sent records on the broker side (receipt resolves to an error)
    pub fn reject_sends(&self, reject: bool) {
        self.shared.state.lock().reject_sends = reject;
    }

    /// Drop acknowledgements so receipts resolve as interrupted
    pub fn interrupt_deliveries(&self, interrupt: bool) {
        self.shared.state.lock().interrupt_deliveries = interrupt;
    }
}

impl BrokerClientFactory for InMemoryBroker {
    fn create_consumer(
        &self,
        settings: &ConsumerSettings,
    ) -> Result<Box<dyn BrokerConsumer>, BrokerError> {
        let mut state = self.shared.state.lock();
        if std::mem::take(&mut state.fail_next_consumer) {
            return Err(BrokerError::client_creation(
                "consumer",
                format!("cannot reach {}", settings.bootstrap_servers),
            ));
        }
        state.next_client_id += 1;
        state.consumers_created += 1;
        let id = state.next_client_id;
        state.consumers.insert(
            id,
            ConsumerEntry {
                group: settings.group_id.clone(),
                subscription: BTreeSet::new(),
            },
        );
        state.last_consumer_settings = Some(settings.clone());
        debug!(client_id = id, group_id = %settings.group_id, "In-memory consumer created");

        Ok(Box::new(InMemoryConsumer {
            id,
            group: settings.group_id.clone(),
            subscription: BTreeSet::new(),
            closed: false,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn create_producer(
        &self,
        settings: &ProducerSettings,
    ) -> Result<Arc<dyn BrokerProducer>, BrokerError> {
        let mut state = self.shared.state.lock();
        if std::mem::take(&mut state.fail_next_producer) {
            return Err(BrokerError::client_creation(
                "producer",
                format!("cannot reach {}", settings.bootstrap_servers),
            ));
        }
        state.producers_created += 1;
        debug!(acks = ?settings.acks, "In-memory producer created");

        Ok(Arc::new(InMemoryProducer {
            shared: Arc::clone(&self.shared),
            closed: AtomicBool::new(false),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

struct InMemoryConsumer {
    id: u64,
    group: String,
    subscription: BTreeSet<String>,
    closed: bool,
    shared: Arc<BrokerShared>,
}

impl InMemoryConsumer {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed {
            Err(BrokerError::closed("consumer"))
        } else {
            Ok(())
        }
    }

    fn set_subscription(&mut self, topics: BTreeSet<String>) {
        if let Some(entry) = self.shared.state.lock().consumers.get_mut(&self.id) {
            entry.subscription = topics.clone();
        }
        self.subscription = topics;
    }
}

#[async_trait]
impl BrokerConsumer for InMemoryConsumer {
    async fn subscribe(&mut self, topics: &BTreeSet<String>) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.set_subscription(topics.clone());
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.set_subscription(BTreeSet::new());
        Ok(())
    }

    fn subscription(&self) -> BTreeSet<String> {
        self.subscription.clone()
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Vec<BrokerRecord>, BrokerError> {
        self.ensure_open()?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before checking so an append in between is not missed
            let mut notified = pin!(self.shared.arrivals.notified());
            notified.as_mut().enable();

            let claimed = self
                .shared
                .state
                .lock()
                .claim(&self.group, &self.subscription);
            if !claimed.is_empty() {
                return Ok(claimed);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn close(&mut self, _timeout: Duration) -> Result<(), BrokerError> {
        if !self.closed {
            self.closed = true;
            self.subscription.clear();
            self.shared.state.lock().consumers.remove(&self.id);
            debug!(client_id = self.id, "In-memory consumer closed");
        }
        Ok(())
    }
}

struct InMemoryProducer {
    shared: Arc<BrokerShared>,
    closed: AtomicBool,
}

#[async_trait]
impl BrokerProducer for InMemoryProducer {
    async fn send(&self, record: ProducerRecord) -> Result<DeliveryReceipt, BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::closed("producer"));
        }

        let topic = record.topic.clone();
        let (reject, interrupt) = {
            let state = self.shared.state.lock();
            (state.reject_sends, state.interrupt_deliveries)
        };

        if interrupt {
            let (sender, receipt) = DeliveryReceipt::channel(topic);
            drop(sender);
            return Ok(receipt);
        }
        if reject {
            return Ok(DeliveryReceipt::completed(
                topic.clone(),
                Err(BrokerError::send(topic, "record rejected by broker")),
            ));
        }

        let metadata = {
            let mut state = self.shared.state.lock();
            state.append(record)
        };
        self.shared.arrivals.notify_waiters();
        Ok(DeliveryReceipt::completed(topic, Ok(metadata)))
    }

    async fn close(&self, _timeout: Duration) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
