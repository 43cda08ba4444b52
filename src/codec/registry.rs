//! # Codec Registry
//!
//! Named codec providers known to the bridge. Topic overrides in configuration
//! refer to providers by name; a deployment can also contribute providers through
//! its type resolution context, which take precedence over the registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::envelope::{CloudEventReader, CloudEventWriter, RawJsonCodec};
use super::types::{CodecError, CodecProvider, EventReader, EventWriter};
use crate::constants::codecs::{CLOUD_EVENTS_JSON, RAW_JSON};

/// Provider handing out a fixed reader/writer pair
#[derive(Debug, Clone)]
pub struct StaticCodecProvider {
    name: String,
    reader: Arc<dyn EventReader>,
    writer: Arc<dyn EventWriter>,
}

impl StaticCodecProvider {
    pub fn new(
        name: impl Into<String>,
        reader: Arc<dyn EventReader>,
        writer: Arc<dyn EventWriter>,
    ) -> Self {
        Self {
            name: name.into(),
            reader,
            writer,
        }
    }
}

impl CodecProvider for StaticCodecProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn reader(&self) -> Result<Arc<dyn EventReader>, CodecError> {
        Ok(self.reader.clone())
    }

    fn writer(&self) -> Result<Arc<dyn EventWriter>, CodecError> {
        Ok(self.writer.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    providers: HashMap<String, Arc<dyn CodecProvider>>,
}

impl CodecRegistry {
    /// Empty registry; lookups fall back to the default envelope codec
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the `cloudevents-json` and `raw-json` providers
    pub fn with_builtin_codecs() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StaticCodecProvider::new(
            CLOUD_EVENTS_JSON,
            Arc::new(CloudEventReader),
            Arc::new(CloudEventWriter),
        )));
        registry.register(Arc::new(StaticCodecProvider::new(
            RAW_JSON,
            Arc::new(RawJsonCodec),
            Arc::new(RawJsonCodec),
        )));
        registry
    }

    /// Register a provider, replacing any provider with the same name
    pub fn register(&mut self, provider: Arc<dyn CodecProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CodecProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
