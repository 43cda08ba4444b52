//! # Messaging Module
//!
//! Broker client abstraction for the event bridge: the consumer/producer seams, the
//! records they exchange, and the providers that implement them.
//!
//! ```text
//! BrokerClientFactory
//!   ├── create_consumer() -> Box<dyn BrokerConsumer>   (owned by ConsumerCoordinator)
//!   └── create_producer() -> Arc<dyn BrokerProducer>   (owned by ProducerGateway)
//! ```

pub mod broker;
pub mod errors;
pub mod providers;
pub mod types;

pub use broker::{BrokerClientFactory, BrokerConsumer, BrokerProducer};
pub use errors::BrokerError;
pub use providers::InMemoryBroker;
pub use types::{
    BrokerRecord, ConsumerSettings, DeliveryReceipt, IsolationLevel, ProducerRecord,
    ProducerSettings, RecordMetadata,
};
