//! Payload codecs.
//!
//! A codec turns a [`BlockStore`] into an opaque [`Payload`] and back. Both
//! formats carry a version tag and decode all-or-nothing: a malformed payload
//! never yields a partial store.
//!
//! For every store `s`: `deserialize(serialize(s)) == s`, including the empty
//! store, whose payload is valid and non-empty.

mod binary;
mod error;
mod json;
mod payload;

use serde::{Deserialize, Serialize};

use crate::block::BlockStore;

pub use binary::BinaryCodec;
pub use error::{CodecError, CodecResult};
pub use json::JsonCodec;
pub use payload::Payload;

/// Serializer between block stores and payloads.
pub trait BlobCodec: Send + Sync {
    /// short name used in logs and configuration
    fn name(&self) -> &'static str;

    /// encode every block of `store`
    fn serialize(&self, store: &BlockStore) -> CodecResult<Payload>;

    /// decode a payload produced by `serialize`
    fn deserialize(&self, payload: &Payload) -> CodecResult<BlockStore>;
}

static BINARY: BinaryCodec = BinaryCodec;
static JSON: JsonCodec = JsonCodec;

/// Codec selection, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Binary,
    Json,
}

impl CodecKind {
    pub fn codec(self) -> &'static dyn BlobCodec {
        match self {
            CodecKind::Binary => &BINARY,
            CodecKind::Json => &JSON,
        }
    }
}

/// Pick the codec that wrote `payload` from its leading bytes.
pub fn detect(payload: &Payload) -> CodecResult<CodecKind> {
    let bytes = payload.as_bytes();
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    if bytes.starts_with(binary::MAGIC) {
        return Ok(CodecKind::Binary);
    }
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Ok(CodecKind::Json),
        _ => Err(CodecError::UnknownFormat),
    }
}

/// Decode a payload written by any known codec.
pub fn decode(payload: &Payload) -> CodecResult<BlockStore> {
    detect(payload)?.codec().deserialize(payload)
}
