//! # Orchestration
//!
//! The moving parts of the bridge: the consumer coordinator feeding inbound records
//! to the process engine, the producer gateway publishing process events, and the
//! [`EventBridge`] facade that owns both.

pub mod bridge;
pub mod consumer_coordinator;
pub mod engine;
pub mod listeners;
pub mod producer_gateway;

pub use bridge::EventBridge;
pub use consumer_coordinator::{ConsumerCoordinator, CoordinatorSettings};
pub use engine::{CallerIdentity, Credentials, EngineError, ProcessSignaller};
pub use listeners::{DeploymentEventListener, ProcessEventListener};
pub use producer_gateway::{ProducerGateway, PublishError, PublishOutcome};
