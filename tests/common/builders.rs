//! Builders for bridges, deployments and record values.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tasker_event_bridge::codec::{CodecRegistry, StaticTypeContext};
use tasker_event_bridge::messaging::InMemoryBroker;
use tasker_event_bridge::models::{ConsumingNode, DeploymentEvent, Descriptor, ProcessDefinition};
use tasker_event_bridge::orchestration::{EventBridge, ProcessSignaller};
use tasker_event_bridge::{BridgeConfig, MappingMode};

pub const WAIT: Duration = Duration::from_secs(5);
/// Time given to the bridge to show that nothing else arrives
pub const SETTLE: Duration = Duration::from_millis(300);

/// Enabled configuration bridging signals, with a short close timeout
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::enabled();
    config.mapping.signals = MappingMode::Auto;
    config.consumer.poll_interval_ms = 200;
    config.close_timeout_secs = 5;
    config
}

pub fn build_bridge(
    broker: &InMemoryBroker,
    signaller: Arc<dyn ProcessSignaller>,
    config: BridgeConfig,
) -> EventBridge {
    EventBridge::new(
        config,
        Arc::new(broker.clone()),
        signaller,
        CodecRegistry::with_builtin_codecs(),
    )
    .expect("valid test configuration")
}

pub fn start_signal(name: &str) -> Descriptor {
    Descriptor::signal(name, None).with_node(ConsumingNode::start("start"))
}

pub fn waiting_signal(name: &str) -> Descriptor {
    Descriptor::signal(name, None).with_node(ConsumingNode::intermediate("catch"))
}

pub fn waiting_message(name: &str, structure_ref: Option<&str>) -> Descriptor {
    Descriptor::message(name, structure_ref).with_node(ConsumingNode::intermediate("receive"))
}

pub fn deployment(id: &str, definitions: Vec<ProcessDefinition>) -> DeploymentEvent {
    DeploymentEvent::new(id, Arc::new(StaticTypeContext::new(id)), definitions)
}

pub fn signal_deployment(id: &str, descriptor: Descriptor) -> DeploymentEvent {
    deployment(id, vec![ProcessDefinition::new("process").with_signal(descriptor)])
}

/// CloudEvents record value carrying `data`
pub fn envelope(data: Value) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "specversion": "1.0",
        "id": uuid::Uuid::new_v4().to_string(),
        "type": "test",
        "source": "/tests",
        "data": data,
    }))
    .expect("serializable envelope")
}
