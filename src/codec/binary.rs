//! Versioned binary payload format.
//!
//! ```text
//! "GBLK"  version:u8  count:u64le  { key:u64le  len:u64le  bytes[len] } * count
//! ```

use crate::block::{BlockKey, BlockStore};
use crate::codec::error::{CodecError, CodecResult};
use crate::codec::payload::Payload;
use crate::codec::BlobCodec;

/// leading bytes of every binary payload
pub const MAGIC: &[u8; 4] = b"GBLK";

/// current binary format version
pub const VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1 + 8;
const ENTRY_HEADER_LEN: usize = 16;

/// Compact binary codec. The default for new repositories.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl BlobCodec for BinaryCodec {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn serialize(&self, store: &BlockStore) -> CodecResult<Payload> {
        let body: usize = store
            .entries()
            .map(|(_, value)| ENTRY_HEADER_LEN + value.len())
            .sum();
        let mut out = Vec::with_capacity(HEADER_LEN + body);

        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.extend_from_slice(&(store.len() as u64).to_le_bytes());
        for (key, value) in store.entries() {
            out.extend_from_slice(&key.to_le_bytes());
            out.extend_from_slice(&(value.len() as u64).to_le_bytes());
            out.extend_from_slice(value);
        }

        Ok(Payload::new(out))
    }

    fn deserialize(&self, payload: &Payload) -> CodecResult<BlockStore> {
        let bytes = payload.as_bytes();
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }

        let mut reader = Reader::new(bytes);
        if reader.take(MAGIC.len())? != MAGIC {
            return Err(CodecError::UnknownFormat);
        }
        let version = reader.take(1)?[0];
        if version != VERSION {
            return Err(CodecError::UnsupportedVersion {
                codec: self.name(),
                version: u64::from(version),
            });
        }

        let count = reader.u64()?;
        if count > (reader.remaining() / ENTRY_HEADER_LEN) as u64 {
            return Err(CodecError::ImplausibleCount {
                count,
                len: bytes.len(),
            });
        }

        let mut store = BlockStore::new();
        for _ in 0..count {
            let key: BlockKey = reader.u64()?;
            let len = reader.u64()?;
            let len = usize::try_from(len).map_err(|_| CodecError::Truncated {
                offset: reader.pos,
                needed: usize::MAX,
            })?;
            let value = reader.take(len)?;
            if store.set(key, value.to_vec()).is_some() {
                return Err(CodecError::DuplicateKey(key));
            }
        }

        if reader.remaining() > 0 {
            return Err(CodecError::TrailingBytes(reader.remaining()));
        }
        Ok(store)
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u64(&mut self) -> CodecResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(store: &BlockStore) -> Payload {
        BinaryCodec.serialize(store).unwrap()
    }

    fn entry(key: u64, value: &[u8]) -> Vec<u8> {
        let mut out = key.to_le_bytes().to_vec();
        out.extend_from_slice(&(value.len() as u64).to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    fn header(count: u64) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.push(VERSION);
        out.extend_from_slice(&count.to_le_bytes());
        out
    }

    #[test]
    fn test_empty_store_has_distinct_payload() {
        let payload = encode(&BlockStore::new());
        assert_eq!(payload.as_bytes(), header(0).as_slice());
        assert!(BinaryCodec.deserialize(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_full_key_range() {
        let mut store = BlockStore::new();
        store.set(u64::MAX, vec![0, 255]);
        store.set(0, vec![]);

        let back = BinaryCodec.deserialize(&encode(&store)).unwrap();
        assert_eq!(back, store);
        assert_eq!(back.get(u64::MAX), Some(&[0u8, 255][..]));
    }

    #[test]
    fn test_rejects_empty_payload() {
        let result = BinaryCodec.deserialize(&Payload::default());
        assert!(matches!(result, Err(CodecError::Empty)));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let result = BinaryCodec.deserialize(&Payload::new(b"NOPE\x01".to_vec()));
        assert!(matches!(result, Err(CodecError::UnknownFormat)));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = header(0);
        bytes[4] = 9;
        let result = BinaryCodec.deserialize(&Payload::new(bytes));
        assert!(matches!(
            result,
            Err(CodecError::UnsupportedVersion { version: 9, .. })
        ));
    }

    #[test]
    fn test_rejects_truncated_value() {
        let mut bytes = header(1);
        bytes.extend(entry(1, b"hello"));
        bytes.truncate(bytes.len() - 2);

        let result = BinaryCodec.deserialize(&Payload::new(bytes));
        assert!(matches!(result, Err(CodecError::Truncated { needed: 2, .. })));
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = encode(&BlockStore::new()).into_bytes();
        bytes.extend_from_slice(&[1, 2, 3]);

        let result = BinaryCodec.deserialize(&Payload::new(bytes));
        assert!(matches!(result, Err(CodecError::TrailingBytes(3))));
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let mut bytes = header(2);
        bytes.extend(entry(4, b"a"));
        bytes.extend(entry(4, b"b"));

        let result = BinaryCodec.deserialize(&Payload::new(bytes));
        assert!(matches!(result, Err(CodecError::DuplicateKey(4))));
    }

    #[test]
    fn test_rejects_oversized_count() {
        let bytes = header(u64::MAX);
        let result = BinaryCodec.deserialize(&Payload::new(bytes));
        assert!(matches!(result, Err(CodecError::ImplausibleCount { .. })));
    }
}
