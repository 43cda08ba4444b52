//! # Lifecycle and Process Events
//!
//! Events the bridge receives from its two collaborators: deployment lifecycle
//! notifications and process-instance activity that may be published outbound.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::codec::TypeResolutionContext;
use crate::models::descriptor::ProcessDefinition;

/// Deployment lifecycle notification (deploy, undeploy, activate, deactivate)
#[derive(Clone)]
pub struct DeploymentEvent {
    pub deployment_id: String,
    /// Resolves the payload types declared by this deployment's descriptors
    pub context: Arc<dyn TypeResolutionContext>,
    pub process_definitions: Vec<ProcessDefinition>,
}

impl DeploymentEvent {
    pub fn new(
        deployment_id: impl Into<String>,
        context: Arc<dyn TypeResolutionContext>,
        process_definitions: Vec<ProcessDefinition>,
    ) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            context,
            process_definitions,
        }
    }
}

impl fmt::Debug for DeploymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentEvent")
            .field("deployment_id", &self.deployment_id)
            .field("context", &self.context.context_id())
            .field("process_definitions", &self.process_definitions.len())
            .finish()
    }
}

/// A signal thrown by a running process instance
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub process_id: String,
    pub process_instance_id: i64,
    pub signal_name: String,
    pub payload: Value,
    /// Implementation attribute of the throwing node, if any
    pub node_implementation: Option<String>,
}

/// A message sent by a running process instance
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub process_id: String,
    pub process_instance_id: i64,
    pub message_name: String,
    pub payload: Value,
}

/// Event ready for publication, whatever its origin
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    /// Signal or message name; also the default topic
    pub name: String,
    pub process_id: String,
    pub process_instance_id: i64,
    pub payload: Value,
}

impl From<SignalEvent> for OutboundEvent {
    fn from(event: SignalEvent) -> Self {
        Self {
            name: event.signal_name,
            process_id: event.process_id,
            process_instance_id: event.process_instance_id,
            payload: event.payload,
        }
    }
}

impl From<MessageEvent> for OutboundEvent {
    fn from(event: MessageEvent) -> Self {
        Self {
            name: event.message_name,
            process_id: event.process_id,
            process_instance_id: event.process_instance_id,
            payload: event.payload,
        }
    }
}
