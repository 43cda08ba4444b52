use std::collections::HashMap;

/// Maps signal and message names to broker topics
///
/// A name is its own topic unless the `topics` configuration table overrides it.
#[derive(Debug, Clone, Default)]
pub struct TopicResolver {
    overrides: HashMap<String, String>,
}

impl TopicResolver {
    pub fn new(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    pub fn topic_for(&self, name: &str) -> String {
        self.overrides
            .get(name)
            .filter(|topic| !topic.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}
