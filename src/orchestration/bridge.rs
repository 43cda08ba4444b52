//! # Event Bridge
//!
//! Explicitly constructed owner of the consumer coordinator and the producer
//! gateway. The embedding engine hands it to its deployment service as a
//! [`DeploymentEventListener`] and to its process runtime as a
//! [`ProcessEventListener`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::consumer_coordinator::{ConsumerCoordinator, CoordinatorSettings};
use super::engine::ProcessSignaller;
use super::listeners::{DeploymentEventListener, ProcessEventListener};
use super::producer_gateway::{ProducerGateway, PublishOutcome};
use crate::codec::{CodecFactory, CodecRegistry};
use crate::config::{BridgeConfig, MappingMode};
use crate::constants::BROKER_NODE_IMPLEMENTATION;
use crate::error::{BridgeError, Result};
use crate::messaging::BrokerClientFactory;
use crate::models::{DeploymentEvent, MessageEvent, SignalEvent};
use crate::registration::{RegistrationTable, TopicResolver};

#[derive(Debug)]
pub struct EventBridge {
    config: BridgeConfig,
    coordinator: ConsumerCoordinator,
    producer: ProducerGateway,
    shut_down: AtomicBool,
}

impl EventBridge {
    /// Build a bridge from validated configuration
    ///
    /// No broker client is created until the first registration or publish.
    pub fn new(
        config: BridgeConfig,
        factory: Arc<dyn BrokerClientFactory>,
        signaller: Arc<dyn ProcessSignaller>,
        registry: CodecRegistry,
    ) -> Result<Self> {
        config.validate()?;

        let codecs = Arc::new(CodecFactory::new(registry, &config.codecs));
        let topics = TopicResolver::new(config.topics.clone());
        let table = RegistrationTable::new(topics.clone(), config.mapping);

        let coordinator = ConsumerCoordinator::new(
            table,
            Arc::clone(&codecs),
            signaller,
            Arc::clone(&factory),
            CoordinatorSettings::from_config(&config),
        );
        let producer = ProducerGateway::new(
            factory,
            config.producer_settings(),
            codecs,
            topics,
            config.producer.publish_mode,
            config.close_timeout(),
        );

        info!(
            bootstrap_servers = %config.client.bootstrap_servers,
            group_id = %config.consumer.group_id,
            publish_mode = ?config.producer.publish_mode,
            signals = ?config.mapping.signals,
            messages = ?config.mapping.messages,
            "🚀 EVENT BRIDGE: Initialized"
        );

        Ok(Self {
            config,
            coordinator,
            producer,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Build the bridge only when the configuration enables it
    pub fn bootstrap(
        config: BridgeConfig,
        factory: Arc<dyn BrokerClientFactory>,
        signaller: Arc<dyn ProcessSignaller>,
        registry: CodecRegistry,
    ) -> Result<Option<Arc<Self>>> {
        if !config.enabled {
            info!("📋 EVENT BRIDGE: Disabled in configuration - not starting");
            return Ok(None);
        }
        Self::new(config, factory, signaller, registry).map(|bridge| Some(Arc::new(bridge)))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &ConsumerCoordinator {
        &self.coordinator
    }

    pub fn producer(&self) -> &ProducerGateway {
        &self.producer
    }

    pub fn subscribed_topics(&self) -> BTreeSet<String> {
        self.coordinator.subscribed_topics()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            Err(BridgeError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Drain in-flight dispatches within the close timeout and release broker clients
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("🛑 EVENT BRIDGE: Shutdown requested");
        self.coordinator.close(self.config.close_timeout()).await;
        self.producer.close().await;
        info!("✅ EVENT BRIDGE: Shutdown complete");
    }

    async fn register(&self, event: &DeploymentEvent) -> Result<()> {
        self.ensure_running()?;
        self.coordinator.add_registration(event).await.map(|_| ())
    }

    async fn unregister(&self, event: &DeploymentEvent) -> Result<()> {
        self.ensure_running()?;
        self.coordinator.remove_registration(event).await.map(|_| ())
    }
}

#[async_trait]
impl DeploymentEventListener for EventBridge {
    async fn on_deploy(&self, event: &DeploymentEvent) -> Result<()> {
        self.register(event).await
    }

    async fn on_undeploy(&self, event: &DeploymentEvent) -> Result<()> {
        self.unregister(event).await
    }

    async fn on_activate(&self, event: &DeploymentEvent) -> Result<()> {
        self.register(event).await
    }

    async fn on_deactivate(&self, event: &DeploymentEvent) -> Result<()> {
        self.unregister(event).await
    }
}

#[async_trait]
impl ProcessEventListener for EventBridge {
    async fn on_signal(&self, event: SignalEvent) -> Result<Option<PublishOutcome>> {
        self.ensure_running()?;
        let marked = event.node_implementation.as_deref() == Some(BROKER_NODE_IMPLEMENTATION);
        if self.config.mapping.signals != MappingMode::Auto && !marked {
            debug!(signal_name = %event.signal_name, "Signal not bridged under current mapping");
            return Ok(None);
        }
        Ok(Some(self.producer.publish(event.into()).await?))
    }

    async fn on_message(&self, event: MessageEvent) -> Result<Option<PublishOutcome>> {
        self.ensure_running()?;
        if self.config.mapping.messages != MappingMode::Auto {
            debug!(message_name = %event.message_name, "Message not bridged under current mapping");
            return Ok(None);
        }
        Ok(Some(self.producer.publish(event.into()).await?))
    }
}
