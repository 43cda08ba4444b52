//! # CloudEvents Envelope Codec
//!
//! Default codec. Record values are flat CloudEvents JSON structures:
//!
//! ```json
//! {"specversion":"1.0","time":"2024-01-01T00:00:00Z","id":"…","type":"Approve",
//!  "source":"/process/orders/42","datacontenttype":"application/json","data":{…}}
//! ```
//!
//! `id`, `type` and `source` are required on read; `specversion` defaults to `1.0`.
//! A missing `datacontenttype` means JSON data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::types::{CodecError, EventReader, EventWriter, PayloadType};
use crate::constants::envelope::{JSON_CONTENT_TYPE, SOURCE_PREFIX, SPEC_VERSION};
use crate::models::OutboundEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    #[serde(default = "default_spec_version")]
    pub specversion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacontenttype: Option<String>,
    #[serde(default)]
    pub data: Value,
}

fn default_spec_version() -> String {
    SPEC_VERSION.to_string()
}

impl CloudEvent {
    /// Envelope for an outbound process event
    pub fn for_outbound(event: &OutboundEvent) -> Self {
        Self {
            specversion: SPEC_VERSION.to_string(),
            time: Some(Utc::now()),
            id: Uuid::new_v4().to_string(),
            event_type: event.name.clone(),
            source: format!(
                "{SOURCE_PREFIX}/{}/{}",
                event.process_id, event.process_instance_id
            ),
            datacontenttype: Some(JSON_CONTENT_TYPE.to_string()),
            data: event.payload.clone(),
        }
    }

    /// Data field interpreted according to the declared content type
    pub fn into_data(self) -> Result<Value, CodecError> {
        match self.datacontenttype.as_deref().map(media_type) {
            None => Ok(self.data),
            Some(media) if media == "application/json" || media.ends_with("+json") => {
                Ok(self.data)
            }
            Some(media) if media.starts_with("text/") => match self.data {
                data @ (Value::String(_) | Value::Null) => Ok(data),
                other => Err(CodecError::type_mismatch(
                    "text data",
                    format!("expected string, found {other}"),
                )),
            },
            Some(media) => Err(CodecError::unsupported_content_type(media)),
        }
    }
}

/// Content type without parameters, lowercased
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn decode_envelope(value: &[u8]) -> Result<CloudEvent, CodecError> {
    let raw: Value = serde_json::from_slice(value).map_err(|e| CodecError::malformed(e.to_string()))?;
    let Value::Object(fields) = &raw else {
        return Err(CodecError::malformed("envelope is not a JSON object"));
    };
    for field in ["id", "type", "source"] {
        if !fields.get(field).is_some_and(Value::is_string) {
            return Err(CodecError::missing_field(field));
        }
    }
    serde_json::from_value(raw).map_err(|e| CodecError::malformed(e.to_string()))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CloudEventReader;

impl EventReader for CloudEventReader {
    fn read_event(&self, value: &[u8], payload_type: &PayloadType) -> Result<Value, CodecError> {
        let envelope = decode_envelope(value)?;
        payload_type.coerce(envelope.into_data()?)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CloudEventWriter;

impl EventWriter for CloudEventWriter {
    fn write_event(&self, event: &OutboundEvent) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&CloudEvent::for_outbound(event))
            .map_err(|e| CodecError::encoding(e.to_string()))
    }
}

/// Envelope-less codec: the record value is the JSON payload itself
#[derive(Debug, Default, Clone, Copy)]
pub struct RawJsonCodec;

impl EventReader for RawJsonCodec {
    fn read_event(&self, value: &[u8], payload_type: &PayloadType) -> Result<Value, CodecError> {
        let decoded: Value =
            serde_json::from_slice(value).map_err(|e| CodecError::malformed(e.to_string()))?;
        payload_type.coerce(decoded)
    }
}

impl EventWriter for RawJsonCodec {
    fn write_event(&self, event: &OutboundEvent) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&event.payload).map_err(|e| CodecError::encoding(e.to_string()))
    }
}
