//! Listener seams the embedding engine drives.

use async_trait::async_trait;

use super::producer_gateway::PublishOutcome;
use crate::error::Result;
use crate::models::{DeploymentEvent, MessageEvent, SignalEvent};

/// Deployment lifecycle callbacks
///
/// Deploy and activate register a deployment's descriptors; undeploy and
/// deactivate remove them. Calls may arrive concurrently from any task.
#[async_trait]
pub trait DeploymentEventListener: Send + Sync {
    async fn on_deploy(&self, event: &DeploymentEvent) -> Result<()>;

    async fn on_undeploy(&self, event: &DeploymentEvent) -> Result<()>;

    async fn on_activate(&self, event: &DeploymentEvent) -> Result<()>;

    async fn on_deactivate(&self, event: &DeploymentEvent) -> Result<()>;
}

/// Process-instance activity that may be published to the broker
///
/// `Ok(None)` means the event is not bridged under the current mapping.
#[async_trait]
pub trait ProcessEventListener: Send + Sync {
    async fn on_signal(&self, event: SignalEvent) -> Result<Option<PublishOutcome>>;

    async fn on_message(&self, event: MessageEvent) -> Result<Option<PublishOutcome>>;
}
