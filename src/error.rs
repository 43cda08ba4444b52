//! # Bridge Error Types
//!
//! Crate-level error that every public bridge operation returns. Component errors
//! convert into it with `?`.

use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigurationError;
use crate::messaging::BrokerError;
use crate::orchestration::PublishError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Event bridge is shut down")]
    ShutDown,

    #[error("Event bridge is disabled")]
    Disabled,

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl BridgeError {
    /// True when the error is caused by a bridge that no longer accepts work
    pub fn is_shut_down(&self) -> bool {
        matches!(
            self,
            BridgeError::ShutDown | BridgeError::Publish(PublishError::ShutDown)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
