//! Portable JSON payload format.
//!
//! ```json
//! {"version":1,"blocks":[["0",[123,34]],["18446744073709551615",[]]]}
//! ```
//!
//! Keys are written as decimal strings so consumers without exact 64-bit
//! integers do not lose precision. Plain JSON numbers are accepted on input.

use serde::{Deserialize, Serialize};

use crate::block::{BlockKey, BlockStore};
use crate::codec::error::{CodecError, CodecResult};
use crate::codec::payload::Payload;
use crate::codec::BlobCodec;

/// current JSON format version
pub const VERSION: u64 = 1;

/// Human-inspectable codec, larger than [`BinaryCodec`](crate::codec::BinaryCodec).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[derive(Serialize)]
struct PayloadOut<'a> {
    version: u64,
    blocks: Vec<(String, &'a [u8])>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PayloadIn {
    version: u64,
    blocks: Vec<(KeyIn, Vec<u64>)>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyIn {
    Number(u64),
    Text(String),
}

impl KeyIn {
    fn resolve(self) -> CodecResult<BlockKey> {
        match self {
            KeyIn::Number(n) => Ok(n),
            KeyIn::Text(text) => parse_key(&text),
        }
    }
}

/// parse a canonical decimal key: digits only, no sign, no leading zeros
fn parse_key(text: &str) -> CodecResult<BlockKey> {
    let canonical = !text.is_empty()
        && text.bytes().all(|b| b.is_ascii_digit())
        && (text == "0" || !text.starts_with('0'));
    if !canonical {
        return Err(CodecError::InvalidKey(text.to_string()));
    }
    text.parse()
        .map_err(|_| CodecError::InvalidKey(text.to_string()))
}

impl BlobCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, store: &BlockStore) -> CodecResult<Payload> {
        let doc = PayloadOut {
            version: VERSION,
            blocks: store
                .entries()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        };
        Ok(Payload::new(serde_json::to_vec(&doc)?))
    }

    fn deserialize(&self, payload: &Payload) -> CodecResult<BlockStore> {
        if payload.is_empty() {
            return Err(CodecError::Empty);
        }

        let doc: PayloadIn = serde_json::from_slice(payload.as_bytes())?;
        if doc.version != VERSION {
            return Err(CodecError::UnsupportedVersion {
                codec: self.name(),
                version: doc.version,
            });
        }

        let mut store = BlockStore::new();
        for (key, values) in doc.blocks {
            let key = key.resolve()?;
            let bytes = values
                .into_iter()
                .map(|value| {
                    u8::try_from(value).map_err(|_| CodecError::ByteOutOfRange { key, value })
                })
                .collect::<CodecResult<Vec<u8>>>()?;
            if store.set(key, bytes).is_some() {
                return Err(CodecError::DuplicateKey(key));
            }
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> CodecResult<BlockStore> {
        JsonCodec.deserialize(&Payload::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_wire_shape() {
        let mut store = BlockStore::new();
        store.set(u64::MAX, vec![1, 2]);
        store.set(3, vec![]);

        let payload = JsonCodec.serialize(&store).unwrap();
        let text = std::str::from_utf8(payload.as_bytes()).unwrap();
        assert_eq!(
            text,
            r#"{"version":1,"blocks":[["3",[]],["18446744073709551615",[1,2]]]}"#
        );
    }

    #[test]
    fn test_empty_store_is_empty_collection() {
        let payload = JsonCodec.serialize(&BlockStore::new()).unwrap();
        assert_eq!(payload.as_bytes(), br#"{"version":1,"blocks":[]}"#);
        assert!(JsonCodec.deserialize(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_accepts_numeric_keys() {
        let store = decode(r#"{"version":1,"blocks":[[7,[255]]]}"#).unwrap();
        assert_eq!(store.get(7), Some(&[255u8][..]));
    }

    #[test]
    fn test_rejects_out_of_range_byte() {
        let result = decode(r#"{"version":1,"blocks":[["1",[12,256]]]}"#);
        assert!(matches!(
            result,
            Err(CodecError::ByteOutOfRange { key: 1, value: 256 })
        ));
    }

    #[test]
    fn test_rejects_negative_byte() {
        assert!(matches!(
            decode(r#"{"version":1,"blocks":[["1",[-1]]]}"#),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let result = decode(r#"{"version":1,"blocks":[["1",[]],[1,[2]]]}"#);
        assert!(matches!(result, Err(CodecError::DuplicateKey(1))));
    }

    #[test]
    fn test_rejects_non_canonical_keys() {
        for key in ["007", "-1", "+1", "", "1e3", "18446744073709551616"] {
            let text = format!(r#"{{"version":1,"blocks":[["{}",[]]]}}"#, key);
            assert!(
                matches!(decode(&text), Err(CodecError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_null_and_missing_fields() {
        assert!(decode("null").is_err());
        assert!(decode(r#"{"version":1,"blocks":null}"#).is_err());
        assert!(decode(r#"{"version":1}"#).is_err());
        assert!(decode(r#"{"version":1,"blocks":[],"extra":0}"#).is_err());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let result = decode(r#"{"version":2,"blocks":[]}"#);
        assert!(matches!(
            result,
            Err(CodecError::UnsupportedVersion { version: 2, .. })
        ));
    }
}
