//! Payload codec error types.

use thiserror::Error;

use crate::block::BlockKey;

/// A payload could not be decoded.
///
/// Decoding is all-or-nothing: any of these errors means no store was
/// produced.
#[derive(Debug, Error)]
pub enum CodecError {
    /// zero-length payload
    #[error("payload is empty")]
    Empty,

    /// leading bytes match no known codec
    #[error("unrecognized payload format")]
    UnknownFormat,

    /// the format tag names a version this build cannot read
    #[error("unsupported {codec} payload version {version}")]
    UnsupportedVersion { codec: &'static str, version: u64 },

    /// input ended in the middle of a field
    #[error("payload truncated at offset {offset}: {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    /// bytes left after the last block
    #[error("{0} trailing bytes after the last block")]
    TrailingBytes(usize),

    /// the declared block count cannot fit in the payload
    #[error("block count {count} does not fit in a payload of {len} bytes")]
    ImplausibleCount { count: u64, len: usize },

    /// the same key appears twice
    #[error("duplicate block key {0}")]
    DuplicateKey(BlockKey),

    /// a key is not a canonical decimal u64
    #[error("invalid block key {0:?}")]
    InvalidKey(String),

    /// a value element is outside 0..=255
    #[error("byte value {value} out of range in block {key}")]
    ByteOutOfRange { key: BlockKey, value: u64 },

    /// malformed JSON document
    #[error("malformed json payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// result type alias for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
