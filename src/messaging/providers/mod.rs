//! # Broker Providers
//!
//! Concrete [`BrokerClientFactory`](super::BrokerClientFactory) implementations.

pub mod in_memory;

pub use in_memory::InMemoryBroker;
