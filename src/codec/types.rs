//! # Codec Seams and Type Resolution
//!
//! Reader/writer strategy traits, the codec provider contract that topic overrides
//! resolve to, and the per-deployment type resolution used to coerce decoded
//! payloads into the type a descriptor declares.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::models::OutboundEvent;

/// Codec error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed envelope: {message}")]
    MalformedEnvelope { message: String },

    #[error("Missing envelope field: {field}")]
    MissingField { field: String },

    #[error("Unsupported data content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    #[error("Unresolvable payload type: {type_name} (context {context_id})")]
    UnresolvableType {
        type_name: String,
        context_id: String,
    },

    #[error("Payload does not match {expected}: {message}")]
    TypeMismatch { expected: String, message: String },

    #[error("Encoding failed: {message}")]
    Encoding { message: String },

    #[error("Unknown codec provider: {name}")]
    UnknownProvider { name: String },
}

impl CodecError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn unsupported_content_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedContentType {
            content_type: content_type.into(),
        }
    }

    pub fn unresolvable_type(type_name: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self::UnresolvableType {
            type_name: type_name.into(),
            context_id: context_id.into(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            message: message.into(),
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }
}

/// Decodes a record value into the payload delivered to the engine
pub trait EventReader: Send + Sync + fmt::Debug {
    fn read_event(&self, value: &[u8], payload_type: &PayloadType) -> Result<Value, CodecError>;
}

/// Encodes an outbound process event into a record value
pub trait EventWriter: Send + Sync + fmt::Debug {
    fn write_event(&self, event: &OutboundEvent) -> Result<Vec<u8>, CodecError>;
}

/// Named source of a reader/writer pair, selectable per topic by configuration
pub trait CodecProvider: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn reader(&self) -> Result<Arc<dyn EventReader>, CodecError>;

    fn writer(&self) -> Result<Arc<dyn EventWriter>, CodecError>;
}

/// Structured payload type declared by a deployment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    /// Canonical name, e.g. `com.acme.Person`
    pub name: String,
    pub required_fields: BTreeSet<String>,
}

impl StructType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_fields: BTreeSet::new(),
        }
    }

    pub fn with_required_field(mut self, field: impl Into<String>) -> Self {
        self.required_fields.insert(field.into());
        self
    }

    /// Name without its package qualifier
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Target type of a decoded payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PayloadType {
    /// No declared type; the decoded value is delivered unchanged
    Any,
    String,
    Integer,
    Float,
    Boolean,
    Structured(StructType),
}

impl PayloadType {
    /// Resolve a primitive type name, with or without the `java.lang.` qualifier
    pub fn primitive(name: &str) -> Option<Self> {
        let simple = name.strip_prefix("java.lang.").unwrap_or(name);
        match simple {
            "String" => Some(PayloadType::String),
            "Integer" | "Long" | "Short" | "Byte" => Some(PayloadType::Integer),
            "Double" | "Float" => Some(PayloadType::Float),
            "Boolean" => Some(PayloadType::Boolean),
            "Object" => Some(PayloadType::Any),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            PayloadType::Any => "Any",
            PayloadType::String => "String",
            PayloadType::Integer => "Integer",
            PayloadType::Float => "Float",
            PayloadType::Boolean => "Boolean",
            PayloadType::Structured(struct_type) => &struct_type.name,
        }
    }

    /// Convert a decoded value to this type
    ///
    /// Numeric and boolean strings are accepted for the matching primitive types;
    /// scalars are rendered for `String`. Null passes through every type.
    pub fn coerce(&self, value: Value) -> Result<Value, CodecError> {
        let mismatch = |value: &Value| CodecError::type_mismatch(self.type_name(), value.to_string());
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (PayloadType::Any, value) => Ok(value),
            (PayloadType::String, Value::String(text)) => Ok(Value::String(text)),
            (PayloadType::String, value @ (Value::Number(_) | Value::Bool(_))) => {
                Ok(Value::String(value.to_string()))
            }
            (PayloadType::Integer, Value::Number(number)) if number.is_i64() || number.is_u64() => {
                Ok(Value::Number(number))
            }
            (PayloadType::Integer, Value::String(text)) => text
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| mismatch(&Value::String(text))),
            (PayloadType::Float, Value::Number(number)) => number
                .as_f64()
                .map(Value::from)
                .ok_or_else(|| mismatch(&Value::Number(number))),
            (PayloadType::Float, Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|parsed| parsed.is_finite())
                .map(Value::from)
                .ok_or_else(|| mismatch(&Value::String(text))),
            (PayloadType::Boolean, Value::Bool(flag)) => Ok(Value::Bool(flag)),
            (PayloadType::Boolean, Value::String(text)) => {
                let parsed = match text.trim() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                };
                parsed
                    .map(Value::Bool)
                    .ok_or_else(|| mismatch(&Value::String(text)))
            }
            (PayloadType::Structured(struct_type), Value::Object(fields)) => {
                match struct_type
                    .required_fields
                    .iter()
                    .find(|field| !fields.contains_key(*field))
                {
                    Some(missing) => Err(CodecError::type_mismatch(
                        &struct_type.name,
                        format!("missing required field {missing}"),
                    )),
                    None => Ok(Value::Object(fields)),
                }
            }
            (_, value) => Err(mismatch(&value)),
        }
    }
}

/// Per-deployment resolver of payload types and deployment-supplied codecs
pub trait TypeResolutionContext: Send + Sync + fmt::Debug {
    /// Stable identifier of this context; part of the reader cache key
    fn context_id(&self) -> &str;

    fn resolve_type(&self, name: &str) -> Option<PayloadType>;

    /// Codec provider contributed by the deployment under this name
    fn codec_provider(&self, _name: &str) -> Option<Arc<dyn CodecProvider>> {
        None
    }
}

/// Resolve a descriptor's structure reference within a context
///
/// No reference resolves to [`PayloadType::Any`]; primitive names resolve without
/// consulting the context.
pub fn resolve_payload_type(
    context: &dyn TypeResolutionContext,
    structure_ref: Option<&str>,
) -> Result<PayloadType, CodecError> {
    let Some(name) = structure_ref.map(str::trim).filter(|name| !name.is_empty()) else {
        return Ok(PayloadType::Any);
    };
    PayloadType::primitive(name)
        .or_else(|| context.resolve_type(name))
        .ok_or_else(|| CodecError::unresolvable_type(name, context.context_id()))
}

/// Type resolution context backed by a fixed set of declared types
#[derive(Debug, Default)]
pub struct StaticTypeContext {
    context_id: String,
    types: Vec<StructType>,
    providers: HashMap<String, Arc<dyn CodecProvider>>,
}

impl StaticTypeContext {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, struct_type: StructType) -> Self {
        self.types.push(struct_type);
        self
    }

    pub fn with_codec_provider(mut self, provider: Arc<dyn CodecProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }
}

impl TypeResolutionContext for StaticTypeContext {
    fn context_id(&self) -> &str {
        &self.context_id
    }

    fn resolve_type(&self, name: &str) -> Option<PayloadType> {
        self.types
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.types.iter().find(|t| t.simple_name() == name))
            .cloned()
            .map(PayloadType::Structured)
    }

    fn codec_provider(&self, name: &str) -> Option<Arc<dyn CodecProvider>> {
        self.providers.get(name).cloned()
    }
}
