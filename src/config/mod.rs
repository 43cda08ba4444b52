//! # Bridge Configuration
//!
//! Typed configuration tree for the event bridge. Every key is optional; defaults
//! live in [`crate::constants::defaults`] and in the embedded
//! `config/event-bridge.toml`.
//!
//! ```toml
//! enabled = true
//! close_timeout_secs = 30
//!
//! [client]
//! bootstrap_servers = "broker-1:9092,broker-2:9092"
//!
//! [consumer]
//! group_id = "jbpm-consumer"
//! poll_interval_ms = 10000
//! max_notify_threads = 10
//!
//! [producer]
//! publish_mode = "sync"
//!
//! [mapping]
//! signals = "auto"
//! messages = "auto"
//!
//! [topics]
//! Approve = "approvals"
//!
//! [codecs.readers]
//! approvals = "raw-json"
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::messaging::{ConsumerSettings, IsolationLevel, ProducerSettings};

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Whether a descriptor family is bridged to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    #[serde(alias = "AUTO", alias = "Auto")]
    Auto,
    #[serde(alias = "NONE", alias = "None")]
    None,
}

/// Send strategy of the producer gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Publish and forget; failures are logged
    #[default]
    #[serde(alias = "ASYNC", alias = "Async")]
    Async,
    /// Wait for the broker acknowledgement and surface failures
    #[serde(alias = "SYNC", alias = "Sync")]
    Sync,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub bootstrap_servers: String,
    pub client_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: defaults::BOOTSTRAP_SERVERS.to_string(),
            client_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub group_id: String,
    /// Upper bound of one broker poll call
    pub poll_interval_ms: u64,
    pub isolation_level: IsolationLevel,
    pub allow_auto_create_topics: Option<bool>,
    /// Ceiling of concurrent record dispatches
    pub max_notify_threads: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: defaults::GROUP_ID.to_string(),
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            isolation_level: IsolationLevel::default(),
            allow_auto_create_topics: None,
            max_notify_threads: defaults::MAX_NOTIFY_THREADS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub publish_mode: PublishMode,
    pub acks: Option<String>,
    pub max_block_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            publish_mode: PublishMode::default(),
            acks: None,
            max_block_ms: defaults::MAX_BLOCK_MS,
        }
    }
}

/// Signals are not bridged unless enabled; messages are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub signals: MappingMode,
    pub messages: MappingMode,
}

impl MappingConfig {
    /// Bridge both signals and messages
    pub fn auto() -> Self {
        Self {
            signals: MappingMode::Auto,
            messages: MappingMode::Auto,
        }
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            signals: MappingMode::None,
            messages: MappingMode::Auto,
        }
    }
}

/// Per-topic codec provider names
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecsConfig {
    pub readers: HashMap<String, String>,
    pub writers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Global switch; a disabled bridge is never constructed
    pub enabled: bool,
    pub client: ClientConfig,
    pub consumer: ConsumerConfig,
    pub producer: ProducerConfig,
    /// Deadline for draining workers and closing clients on shutdown
    pub close_timeout_secs: u64,
    pub mapping: MappingConfig,
    /// Signal/message name -> topic
    pub topics: HashMap<String, String>,
    pub codecs: CodecsConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client: ClientConfig::default(),
            consumer: ConsumerConfig::default(),
            producer: ProducerConfig::default(),
            close_timeout_secs: defaults::CLOSE_TIMEOUT_SECS,
            mapping: MappingConfig::default(),
            topics: HashMap::new(),
            codecs: CodecsConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Enabled configuration with defaults, convenient for embedding and tests
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.client.bootstrap_servers.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "client.bootstrap_servers",
                "",
                "must not be empty",
            ));
        }
        if self.consumer.group_id.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "consumer.group_id",
                "",
                "must not be empty",
            ));
        }
        if self.consumer.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "consumer.poll_interval_ms",
                "0",
                "must be greater than zero",
            ));
        }
        if self.consumer.max_notify_threads == 0 {
            return Err(ConfigurationError::invalid_value(
                "consumer.max_notify_threads",
                "0",
                "must be at least 1",
            ));
        }
        if let Some((name, _)) = self.topics.iter().find(|(_, topic)| topic.trim().is_empty()) {
            return Err(ConfigurationError::invalid_value(
                format!("topics.{name}"),
                "",
                "topic override must not be empty",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.consumer.poll_interval_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }

    pub fn max_block(&self) -> Duration {
        Duration::from_millis(self.producer.max_block_ms)
    }

    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            bootstrap_servers: self.client.bootstrap_servers.clone(),
            client_id: self.client.client_id.clone(),
            group_id: self.consumer.group_id.clone(),
            isolation_level: self.consumer.isolation_level,
            allow_auto_create_topics: self.consumer.allow_auto_create_topics,
        }
    }

    pub fn producer_settings(&self) -> ProducerSettings {
        ProducerSettings {
            bootstrap_servers: self.client.bootstrap_servers.clone(),
            client_id: self.client.client_id.clone(),
            acks: self.producer.acks.clone(),
            max_block: self.max_block(),
        }
    }
}
