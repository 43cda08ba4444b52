//! # Codec Factory
//!
//! Resolves and caches the reader used per (topic, type resolution context) and the
//! writer used per topic.
//!
//! Resolution order for a topic with a configured override name:
//! 1. a provider of that name contributed by the deployment's context (readers only)
//! 2. a provider of that name in the [`CodecRegistry`]
//! 3. the default CloudEvents codec
//!
//! Resolution failures are logged and fall back to the default codec; they never
//! reach the caller.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::envelope::{CloudEventReader, CloudEventWriter};
use super::registry::CodecRegistry;
use super::types::{CodecError, CodecProvider, EventReader, EventWriter, TypeResolutionContext};
use crate::config::CodecsConfig;

#[derive(Debug)]
pub struct CodecFactory {
    registry: CodecRegistry,
    reader_overrides: HashMap<String, String>,
    writer_overrides: HashMap<String, String>,
    default_reader: Arc<dyn EventReader>,
    default_writer: Arc<dyn EventWriter>,
    /// (topic, context id) -> reader
    readers: DashMap<(String, String), Arc<dyn EventReader>>,
    writers: DashMap<String, Arc<dyn EventWriter>>,
}

impl CodecFactory {
    pub fn new(registry: CodecRegistry, overrides: &CodecsConfig) -> Self {
        Self {
            registry,
            reader_overrides: overrides.readers.clone(),
            writer_overrides: overrides.writers.clone(),
            default_reader: Arc::new(CloudEventReader),
            default_writer: Arc::new(CloudEventWriter),
            readers: DashMap::new(),
            writers: DashMap::new(),
        }
    }

    pub fn reader_for(
        &self,
        topic: &str,
        context: &dyn TypeResolutionContext,
    ) -> Arc<dyn EventReader> {
        let key = (topic.to_string(), context.context_id().to_string());
        if let Some(reader) = self.readers.get(&key) {
            return reader.clone();
        }

        let reader = match self.reader_overrides.get(topic) {
            None => self.default_reader.clone(),
            Some(name) => {
                let provider = context.codec_provider(name).or_else(|| self.registry.get(name));
                match resolve_with(provider, name, |p| p.reader()) {
                    Ok(reader) => {
                        debug!(topic = %topic, codec = %name, context = %key.1, "Resolved reader override");
                        reader
                    }
                    Err(e) => {
                        warn!(
                            topic = %topic,
                            codec = %name,
                            error = %e,
                            "⚠️ CODEC: Reader override unavailable, using default envelope reader"
                        );
                        self.default_reader.clone()
                    }
                }
            }
        };

        self.readers.entry(key).or_insert(reader).clone()
    }

    pub fn writer_for(&self, topic: &str) -> Arc<dyn EventWriter> {
        if let Some(writer) = self.writers.get(topic) {
            return writer.clone();
        }

        let writer = match self.writer_overrides.get(topic) {
            None => self.default_writer.clone(),
            Some(name) => match resolve_with(self.registry.get(name), name, |p| p.writer()) {
                Ok(writer) => writer,
                Err(e) => {
                    warn!(
                        topic = %topic,
                        codec = %name,
                        error = %e,
                        "⚠️ CODEC: Writer override unavailable, using default envelope writer"
                    );
                    self.default_writer.clone()
                }
            },
        };

        self.writers
            .entry(topic.to_string())
            .or_insert(writer)
            .clone()
    }

    /// Evict the cached reader of a topic that no longer has registrations
    pub fn topic_released(&self, topic: &str, context: &dyn TypeResolutionContext) {
        let key = (topic.to_string(), context.context_id().to_string());
        if self.readers.remove(&key).is_some() {
            debug!(topic = %topic, context = %key.1, "Released cached reader");
        }
    }

    pub fn cached_readers(&self) -> usize {
        self.readers.len()
    }
}

fn resolve_with<T>(
    provider: Option<Arc<dyn CodecProvider>>,
    name: &str,
    build: impl FnOnce(&dyn CodecProvider) -> Result<T, CodecError>,
) -> Result<T, CodecError> {
    let provider = provider.ok_or_else(|| CodecError::unknown_provider(name))?;
    build(provider.as_ref())
}
