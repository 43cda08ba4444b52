#![allow(clippy::doc_markdown)] // Allow technical terms like CloudEvents, TOML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Event Bridge
//!
//! Bridges a publish/subscribe message broker and a long-running process engine.
//!
//! ## Overview
//!
//! Inbound broker records are routed to the named signals and messages that deployed
//! process definitions are waiting on. Selected process-instance events travel the other
//! way: they are wrapped in a CloudEvents envelope and published to broker topics.
//!
//! ## Architecture
//!
//! ```text
//! deployment lifecycle ──► RegistrationTable ──► ConsumerCoordinator ──► broker subscribe
//!                                                       │
//!                        broker records ──► poll loop ──┴─► DispatchWorkerPool
//!                                                              │
//!                                      CodecFactory (reader) ◄─┴─► ProcessSignaller
//!
//! process events ──► ProducerGateway ──► CodecFactory (writer) ──► broker publish
//! ```
//!
//! ## Module Organization
//!
//! - [`models`] - descriptors, process definitions and lifecycle/process events
//! - [`registration`] - topic → descriptor → deployment routing table
//! - [`deployment`] - version-agnostic and version-ordered deployment identities
//! - [`codec`] - envelope reader/writer resolution with per-topic overrides
//! - [`messaging`] - broker client seams and the in-memory provider
//! - [`execution`] - bounded dispatch worker pool
//! - [`orchestration`] - consumer coordinator, producer gateway and the bridge facade
//! - [`config`] - layered configuration loading
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasker_event_bridge::codec::CodecRegistry;
//! use tasker_event_bridge::config::ConfigManager;
//! use tasker_event_bridge::messaging::InMemoryBroker;
//! use tasker_event_bridge::orchestration::{EventBridge, ProcessSignaller};
//!
//! # async fn example(signaller: Arc<dyn ProcessSignaller>) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let broker = InMemoryBroker::new();
//!
//! if let Some(bridge) = EventBridge::bootstrap(
//!     manager.config().clone(),
//!     Arc::new(broker),
//!     signaller,
//!     CodecRegistry::with_builtin_codecs(),
//! )? {
//!     // hand `bridge` to the deployment service as a DeploymentEventListener
//!     bridge.shutdown().await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod constants;
pub mod deployment;
pub mod error;
pub mod execution;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod registration;

pub use config::{BridgeConfig, ConfigManager, MappingMode, PublishMode};
pub use error::{BridgeError, Result};
pub use orchestration::{
    ConsumerCoordinator, DeploymentEventListener, EventBridge, ProcessEventListener,
    ProcessSignaller, ProducerGateway,
};
pub use registration::RegistrationTable;
