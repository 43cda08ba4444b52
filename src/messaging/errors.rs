//! # Messaging Error Types
//!
//! Structured broker client errors using thiserror instead of `Box<dyn Error>` patterns.

use thiserror::Error;

/// Broker client error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Broker connection error: {message}")]
    Connection { message: String },

    #[error("Broker client creation failed: {client}: {message}")]
    ClientCreation { client: String, message: String },

    #[error("Subscription update failed for topics {topics:?}: {message}")]
    Subscription { topics: Vec<String>, message: String },

    #[error("Poll failed: {message}")]
    Poll { message: String },

    #[error("Send failed: {topic}: {message}")]
    Send { topic: String, message: String },

    #[error("Delivery of record to {topic} was interrupted before acknowledgement")]
    DeliveryInterrupted { topic: String },

    #[error("Broker operation timed out: {operation} after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Broker client is closed: {client}")]
    Closed { client: String },
}

impl BrokerError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a client creation error
    pub fn client_creation(client: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClientCreation {
            client: client.into(),
            message: message.into(),
        }
    }

    /// Create a subscription error
    pub fn subscription<'a>(
        topics: impl IntoIterator<Item = &'a String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Subscription {
            topics: topics.into_iter().cloned().collect(),
            message: message.into(),
        }
    }

    /// Create a poll error
    pub fn poll(message: impl Into<String>) -> Self {
        Self::Poll {
            message: message.into(),
        }
    }

    /// Create a send error
    pub fn send(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a delivery interrupted error
    pub fn delivery_interrupted(topic: impl Into<String>) -> Self {
        Self::DeliveryInterrupted {
            topic: topic.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a closed client error
    pub fn closed(client: impl Into<String>) -> Self {
        Self::Closed {
            client: client.into(),
        }
    }

    /// Transient errors are retried by the poll loop simply continuing
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Connection { .. } | BrokerError::Poll { .. } | BrokerError::Timeout { .. }
        )
    }
}
