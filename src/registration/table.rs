//! # Registration Table
//!
//! Thread-safe routing table of
//! `topic → descriptor → deployment identity → version-ordered deployments`, kept in
//! two sub-tables (signals and messages).
//!
//! ## Invariants
//!
//! - A topic is present iff at least one identity under it holds a non-empty version
//!   set. Emptied branches are pruned in the same critical section that empties them.
//! - Registering a deployment is idempotent: a deployment id always maps to the same
//!   versioned id, and version sets are sets.
//!
//! ## Dispatch policy
//!
//! Descriptors consumed by a start node deliver to the highest version of each
//! deployment identity only (latest wins). All other descriptors deliver to every
//! registered deployment so instances of older versions still receive what they are
//! waiting for.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use parking_lot::Mutex;
use tracing::debug;

use super::topics::TopicResolver;
use crate::config::{MappingConfig, MappingMode};
use crate::deployment::{DeploymentIdentity, DeploymentIdentityResolver, VersionedDeploymentId};
use crate::logging::log_registration_change;
use crate::models::{Descriptor, DescriptorKind, ProcessDefinition};

type DeploymentIndex = BTreeMap<DeploymentIdentity, BTreeSet<VersionedDeploymentId>>;
type TopicTable = HashMap<String, HashMap<Descriptor, DeploymentIndex>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegisteredEntry {
    topic: String,
    descriptor: Descriptor,
}

#[derive(Debug, Default)]
struct TableState {
    signals: TopicTable,
    messages: TopicTable,
    /// Entries registered per deployment id, used to remove exactly what was added
    registered: HashMap<String, HashSet<RegisteredEntry>>,
}

impl TableState {
    fn table_mut(&mut self, kind: DescriptorKind) -> &mut TopicTable {
        match kind {
            DescriptorKind::Signal => &mut self.signals,
            DescriptorKind::Message => &mut self.messages,
        }
    }

    fn has_topic(&self, topic: &str) -> bool {
        self.signals.contains_key(topic) || self.messages.contains_key(topic)
    }

    fn topics(&self) -> BTreeSet<String> {
        self.signals
            .keys()
            .chain(self.messages.keys())
            .cloned()
            .collect()
    }

    /// Remove one versioned id and prune every branch it leaves empty
    fn remove_entry(
        &mut self,
        entry: &RegisteredEntry,
        identity: &DeploymentIdentity,
        versioned: &VersionedDeploymentId,
    ) {
        let table = self.table_mut(entry.descriptor.kind);
        let Some(descriptors) = table.get_mut(&entry.topic) else {
            return;
        };
        if let Some(identities) = descriptors.get_mut(&entry.descriptor) {
            if let Some(versions) = identities.get_mut(identity) {
                versions.remove(versioned);
                if versions.is_empty() {
                    identities.remove(identity);
                }
            }
            if identities.is_empty() {
                descriptors.remove(&entry.descriptor);
            }
        }
        if descriptors.is_empty() {
            table.remove(&entry.topic);
        }
    }
}

/// One delivery the dispatcher must perform for a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTarget {
    pub descriptor: Descriptor,
    pub deployment_id: String,
}

impl DispatchTarget {
    pub fn signal_name(&self) -> String {
        self.descriptor.engine_signal_name()
    }
}

#[derive(Debug)]
pub struct RegistrationTable {
    state: Mutex<TableState>,
    topics: TopicResolver,
    identities: DeploymentIdentityResolver,
    mapping: MappingConfig,
}

impl RegistrationTable {
    pub fn new(topics: TopicResolver, mapping: MappingConfig) -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            topics,
            identities: DeploymentIdentityResolver::new(),
            mapping,
        }
    }

    pub fn topic_resolver(&self) -> &TopicResolver {
        &self.topics
    }

    fn mode(&self, kind: DescriptorKind) -> MappingMode {
        match kind {
            DescriptorKind::Signal => self.mapping.signals,
            DescriptorKind::Message => self.mapping.messages,
        }
    }

    /// Descriptor entries a deployment contributes under the current mapping modes
    fn entries_for(&self, definitions: &[ProcessDefinition]) -> Vec<RegisteredEntry> {
        [DescriptorKind::Signal, DescriptorKind::Message]
            .into_iter()
            .filter(|kind| self.mode(*kind) == MappingMode::Auto)
            .flat_map(move |kind| {
                definitions
                    .iter()
                    .flat_map(move |definition| definition.descriptors(kind).iter())
            })
            .filter(|descriptor| descriptor.has_consumers())
            .map(|descriptor| RegisteredEntry {
                topic: self.topics.topic_for(&descriptor.name),
                descriptor: descriptor.clone(),
            })
            .collect()
    }

    /// Register every consumed descriptor of a deployment
    ///
    /// Returns the full set of topics that need a subscription afterwards.
    pub fn add_registration(
        &self,
        deployment_id: &str,
        definitions: &[ProcessDefinition],
    ) -> BTreeSet<String> {
        let resolved = self.identities.resolve(deployment_id);
        let entries = self.entries_for(definitions);

        let topics = {
            let mut state = self.state.lock();
            for entry in &entries {
                state
                    .table_mut(entry.descriptor.kind)
                    .entry(entry.topic.clone())
                    .or_default()
                    .entry(entry.descriptor.clone())
                    .or_default()
                    .entry(resolved.identity.clone())
                    .or_default()
                    .insert(resolved.versioned.clone());
            }
            if !entries.is_empty() {
                state
                    .registered
                    .entry(deployment_id.to_string())
                    .or_default()
                    .extend(entries);
            }
            state.topics()
        };

        log_registration_change("add", deployment_id, &topics);
        topics
    }

    /// Remove a deployment's registrations
    ///
    /// Removes what the deployment registered earlier plus anything `definitions`
    /// describes. `on_topic_removed` runs, outside the table lock, once for every
    /// topic that lost its last registration.
    pub fn remove_registration(
        &self,
        deployment_id: &str,
        definitions: &[ProcessDefinition],
        mut on_topic_removed: impl FnMut(&str),
    ) -> BTreeSet<String> {
        let resolved = self.identities.resolve(deployment_id);

        let (topics, released) = {
            let mut state = self.state.lock();
            let mut entries = state.registered.remove(deployment_id).unwrap_or_default();
            entries.extend(self.entries_for(definitions));

            let mut touched = BTreeSet::new();
            for entry in &entries {
                state.remove_entry(entry, &resolved.identity, &resolved.versioned);
                touched.insert(entry.topic.clone());
            }
            let released: Vec<String> = touched
                .into_iter()
                .filter(|topic| !state.has_topic(topic))
                .collect();
            (state.topics(), released)
        };

        for topic in &released {
            debug!(topic = %topic, deployment_id = %deployment_id, "Topic has no remaining registrations");
            on_topic_removed(topic);
        }
        log_registration_change("remove", deployment_id, &topics);
        topics
    }

    /// Deliveries for a record received on `topic`
    ///
    /// Empty when nothing is registered under the topic.
    pub fn dispatch(&self, topic: &str) -> Vec<DispatchTarget> {
        let state = self.state.lock();
        let mut targets = Vec::new();
        for table in [&state.signals, &state.messages] {
            let Some(descriptors) = table.get(topic) else {
                continue;
            };
            for (descriptor, identities) in descriptors {
                let latest_only = descriptor.has_start_node();
                for versions in identities.values() {
                    let selected: Box<dyn Iterator<Item = &VersionedDeploymentId>> = if latest_only {
                        Box::new(versions.last().into_iter())
                    } else {
                        Box::new(versions.iter())
                    };
                    targets.extend(selected.map(|versioned| DispatchTarget {
                        descriptor: descriptor.clone(),
                        deployment_id: versioned.deployment_id.clone(),
                    }));
                }
            }
        }
        targets
    }

    pub fn topics(&self) -> BTreeSet<String> {
        self.state.lock().topics()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.signals.is_empty() && state.messages.is_empty()
    }

    /// Deployment ids with at least one registration
    pub fn deployments(&self) -> BTreeSet<String> {
        self.state.lock().registered.keys().cloned().collect()
    }

    /// Drop every registration
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.signals.clear();
        state.messages.clear();
        state.registered.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConsumingNode;

    fn table() -> RegistrationTable {
        RegistrationTable::new(TopicResolver::default(), MappingConfig::auto())
    }

    fn start_signal(name: &str) -> Descriptor {
        Descriptor::signal(name, None).with_node(ConsumingNode::start("start"))
    }

    fn waiting_signal(name: &str) -> Descriptor {
        Descriptor::signal(name, None).with_node(ConsumingNode::intermediate("catch"))
    }

    fn definition(descriptor: Descriptor) -> Vec<ProcessDefinition> {
        vec![ProcessDefinition::new("process").with_signal(descriptor)]
    }

    fn deployments(targets: &[DispatchTarget]) -> Vec<&str> {
        let mut ids: Vec<&str> = targets.iter().map(|t| t.deployment_id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_latest_wins_for_start_nodes() {
        let table = table();
        let defs = definition(start_signal("S"));
        table.add_registration("g:a:1.0", &defs);
        table.add_registration("g:a:2.0", &defs);
        table.add_registration("g:other:1.0", &defs);

        assert_eq!(deployments(&table.dispatch("S")), vec!["g:a:2.0", "g:other:1.0"]);
    }

    #[test]
    fn test_latest_start_version_is_independent_of_registration_order() {
        let defs = definition(start_signal("S"));
        for order in [
            ["g:a:1.0-alpha1", "g:a:1", "g:a:1-sp1"],
            ["g:a:1-sp1", "g:a:1.0-alpha1", "g:a:1"],
            ["g:a:1", "g:a:1-sp1", "g:a:1.0-alpha1"],
        ] {
            let table = table();
            for id in order {
                table.add_registration(id, &defs);
            }
            assert_eq!(deployments(&table.dispatch("S")), vec!["g:a:1-sp1"], "order {order:?}");
        }
    }

    #[test]
    fn test_broadcast_for_in_flight_nodes() {
        let table = table();
        let defs = definition(waiting_signal("T"));
        table.add_registration("g:a:1.0", &defs);
        table.add_registration("g:a:2.0", &defs);

        assert_eq!(deployments(&table.dispatch("T")), vec!["g:a:1.0", "g:a:2.0"]);
    }

    #[test]
    fn test_idempotent_registration() {
        let table = table();
        let defs = definition(waiting_signal("T"));
        let once = table.add_registration("g:a:1.0", &defs);
        let twice = table.add_registration("g:a:1.0", &defs);
        assert_eq!(once, twice);
        assert_eq!(table.dispatch("T").len(), 1);
    }

    #[test]
    fn test_descriptors_without_consumers_are_skipped() {
        let table = table();
        let topics = table.add_registration("d", &definition(Descriptor::signal("Unused", None)));
        assert!(topics.is_empty());
        assert!(table.is_empty());
        assert!(table.deployments().is_empty());
    }

    #[test]
    fn test_removal_prunes_and_reports_topics() {
        let table = table();
        let defs = vec![ProcessDefinition::new("p")
            .with_signal(waiting_signal("A"))
            .with_signal(waiting_signal("B"))];
        table.add_registration("g:a:1.0", &defs);
        table.add_registration("g:a:2.0", &definition(waiting_signal("A")));

        let mut released = Vec::new();
        let topics = table.remove_registration("g:a:1.0", &[], |t| released.push(t.to_string()));
        assert_eq!(released, vec!["B"]);
        assert_eq!(topics, BTreeSet::from(["A".to_string()]));

        let topics = table.remove_registration("g:a:2.0", &[], |t| released.push(t.to_string()));
        assert!(topics.is_empty());
        assert!(table.is_empty());
        assert_eq!(released, vec!["B", "A"]);
    }

    #[test]
    fn test_removal_by_definitions_without_prior_index() {
        let table = table();
        let defs = definition(waiting_signal("A"));
        table.add_registration("d1", &defs);
        // Index is the primary source; definitions alone also remove
        {
            table.state.lock().registered.clear();
        }
        let topics = table.remove_registration("d1", &defs, |_| {});
        assert!(topics.is_empty());
    }

    #[test]
    fn test_shared_topic_between_signal_and_message() {
        let table = table();
        let defs = vec![ProcessDefinition::new("p")
            .with_signal(waiting_signal("orders"))
            .with_message(Descriptor::message("orders", None).with_node(ConsumingNode::start("s")))];
        table.add_registration("d1", &defs);

        let targets = table.dispatch("orders");
        let names: BTreeSet<String> = targets.iter().map(DispatchTarget::signal_name).collect();
        assert_eq!(
            names,
            BTreeSet::from(["orders".to_string(), "Message-orders".to_string()])
        );

        let mut released = 0;
        table.remove_registration("d1", &[], |_| released += 1);
        assert_eq!(released, 1);
    }

    #[test]
    fn test_mapping_mode_none_skips_family() {
        let table = RegistrationTable::new(
            TopicResolver::default(),
            MappingConfig {
                signals: MappingMode::None,
                messages: MappingMode::Auto,
            },
        );
        let defs = vec![ProcessDefinition::new("p")
            .with_signal(waiting_signal("S"))
            .with_message(Descriptor::message("M", None).with_node(ConsumingNode::intermediate("c")))];
        let topics = table.add_registration("d1", &defs);
        assert_eq!(topics, BTreeSet::from(["M".to_string()]));
    }

    #[test]
    fn test_topic_override() {
        let table = RegistrationTable::new(
            TopicResolver::new(HashMap::from([("S".to_string(), "signals-topic".to_string())])),
            MappingConfig::auto(),
        );
        table.add_registration("d1", &definition(waiting_signal("S")));
        assert!(table.dispatch("S").is_empty());
        assert_eq!(table.dispatch("signals-topic").len(), 1);
    }

    #[test]
    fn test_unknown_topic_dispatch_is_empty() {
        let table = table();
        assert!(table.dispatch("nothing").is_empty());
    }
}
