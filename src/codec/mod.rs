//! # Codec Factory
//!
//! Wire codecs for record values: the default CloudEvents envelope, pluggable
//! per-topic overrides and the type resolution that shapes decoded payloads.

pub mod envelope;
pub mod factory;
pub mod registry;
pub mod types;

pub use envelope::{CloudEvent, CloudEventReader, CloudEventWriter, RawJsonCodec};
pub use factory::CodecFactory;
pub use registry::{CodecRegistry, StaticCodecProvider};
pub use types::{
    resolve_payload_type, CodecError, CodecProvider, EventReader, EventWriter, PayloadType,
    StaticTypeContext, StructType, TypeResolutionContext,
};
