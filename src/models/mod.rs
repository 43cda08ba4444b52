pub mod descriptor;
pub mod events;

// Re-export core models for easy access
pub use descriptor::{ConsumingNode, Descriptor, DescriptorKind, NodeKind, ProcessDefinition};
pub use events::{DeploymentEvent, MessageEvent, OutboundEvent, SignalEvent};
