//! # Signal and Message Descriptors
//!
//! Immutable descriptions of the named triggers a process definition can receive.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::MESSAGE_SIGNAL_PREFIX;

/// Whether a descriptor names a signal or a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    Signal,
    Message,
}

impl DescriptorKind {
    /// Name used when delivering a trigger of this kind to the process engine
    ///
    /// Messages are prefixed so the engine can tell them apart from native signals.
    pub fn engine_signal_name(&self, name: &str) -> String {
        match self {
            DescriptorKind::Signal => name.to_string(),
            DescriptorKind::Message => format!("{MESSAGE_SIGNAL_PREFIX}{name}"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorKind::Signal => "signal",
            DescriptorKind::Message => "message",
        }
    }
}

/// Role of a node that consumes a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Creates a new process instance when triggered
    Start,
    /// Catching event inside the process flow
    Intermediate,
    /// Event attached to an activity boundary
    Boundary,
    /// Event sub-process start inside a running instance
    EventSubprocess,
}

/// A process node waiting on a trigger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConsumingNode {
    pub node_id: String,
    pub kind: NodeKind,
}

impl ConsumingNode {
    pub fn start(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            kind: NodeKind::Start,
        }
    }

    pub fn intermediate(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            kind: NodeKind::Intermediate,
        }
    }
}

/// A named signal or message a process definition can receive
///
/// The structure reference names the payload type used for deserialization; no
/// reference means the payload is delivered as decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
    pub kind: DescriptorKind,
    pub name: String,
    pub structure_ref: Option<String>,
    pub nodes: BTreeSet<ConsumingNode>,
}

impl Descriptor {
    pub fn signal(name: impl Into<String>, structure_ref: Option<&str>) -> Self {
        Self::new(DescriptorKind::Signal, name, structure_ref)
    }

    pub fn message(name: impl Into<String>, structure_ref: Option<&str>) -> Self {
        Self::new(DescriptorKind::Message, name, structure_ref)
    }

    fn new(kind: DescriptorKind, name: impl Into<String>, structure_ref: Option<&str>) -> Self {
        Self {
            kind,
            name: name.into(),
            structure_ref: structure_ref.map(str::to_string),
            nodes: BTreeSet::new(),
        }
    }

    pub fn with_node(mut self, node: ConsumingNode) -> Self {
        self.nodes.insert(node);
        self
    }

    /// At least one node consumes this trigger
    pub fn has_consumers(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// At least one consuming node starts a new process instance
    pub fn has_start_node(&self) -> bool {
        self.nodes.iter().any(|node| node.kind == NodeKind::Start)
    }

    pub fn engine_signal_name(&self) -> String {
        self.kind.engine_signal_name(&self.name)
    }
}

/// A deployed process definition and the triggers it receives
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub process_id: String,
    pub signals: Vec<Descriptor>,
    pub messages: Vec<Descriptor>,
}

impl ProcessDefinition {
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            ..Default::default()
        }
    }

    pub fn with_signal(mut self, descriptor: Descriptor) -> Self {
        self.signals.push(descriptor);
        self
    }

    pub fn with_message(mut self, descriptor: Descriptor) -> Self {
        self.messages.push(descriptor);
        self
    }

    pub fn descriptors(&self, kind: DescriptorKind) -> &[Descriptor] {
        match kind {
            DescriptorKind::Signal => &self.signals,
            DescriptorKind::Message => &self.messages,
        }
    }
}
