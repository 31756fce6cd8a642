//! Value and key/value set decoding
//!
//! ## Key/Value Set Layout
//! ```text
//! ┌───────────┬──────────────────────────────────────────────────────────┐
//! │ Count (4) │ Count × [KeyLen (4)][Key][Enc (1)?][ValLen (4)][Value]   │
//! └───────────┴──────────────────────────────────────────────────────────┘
//! ```
//! The encoding byte is present only in the encoded protocol variant.
//! Keys and values are sliced out of the reply buffer without copying.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{GibsonError, Result};
use super::{Encoding, ProtocolVariant, Value};

// =============================================================================
// Bounds-checked reader
// =============================================================================

/// Cursor over an immutable reply buffer
///
/// Every read checks the remaining length first, so a malformed buffer turns
/// into a `Protocol` error instead of a panic or a silent truncation.
#[derive(Debug, Clone)]
pub struct PayloadReader {
    buf: Bytes,
}

impl PayloadReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1, "u8")?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4, "u32")?;
        Ok(self.buf.get_u32_le())
    }

    /// Split off the next `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.ensure(len, "bytes")?;
        Ok(self.buf.split_to(len))
    }

    fn ensure(&self, needed: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(GibsonError::Protocol(format!(
                "Truncated buffer: need {} bytes for {}, {} left",
                needed,
                what,
                self.buf.remaining()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Value decoding
// =============================================================================

/// Decode a single value according to its encoding tag
///
/// Plain and compressed payloads are returned as bytes; a numeric payload is
/// widened to `i64`. Without a tag (legacy protocol) the payload is bytes.
pub fn decode_value(encoding: Option<Encoding>, payload: Bytes) -> Result<Value> {
    match encoding {
        Some(Encoding::Number) => decode_binary_number(&payload).map(Value::Number),
        Some(Encoding::Plain) | Some(Encoding::Compressed) | None => Ok(Value::Bytes(payload)),
    }
}

/// Decode an integer reply (counts, meta fields)
///
/// A numeric tag or a missing tag means a binary integer; a plain tag means
/// ASCII decimal.
pub fn decode_number(encoding: Option<Encoding>, payload: &[u8]) -> Result<i64> {
    match encoding {
        Some(Encoding::Number) | None => decode_binary_number(payload),
        Some(Encoding::Plain) | Some(Encoding::Compressed) => std::str::from_utf8(payload)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                GibsonError::Protocol(format!(
                    "Expected a decimal number, got {} bytes of text",
                    payload.len()
                ))
            }),
    }
}

/// Little-endian signed integer of 8 (server `long`) or 4 bytes
fn decode_binary_number(payload: &[u8]) -> Result<i64> {
    match payload.len() {
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(payload);
            Ok(i64::from_le_bytes(raw))
        }
        4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(payload);
            Ok(i64::from(i32::from_le_bytes(raw)))
        }
        n => Err(GibsonError::Protocol(format!(
            "Numeric payload must be 4 or 8 bytes, got {}",
            n
        ))),
    }
}

// =============================================================================
// Key/value sets
// =============================================================================

/// Ordered key/value pairs from a multi-key reply, in wire order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueSet {
    entries: Vec<(Bytes, Value)>,
}

impl KeyValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn push(&mut self, key: impl Into<Bytes>, value: Value) {
        self.entries.push((key.into(), value));
    }

    pub fn into_vec(self) -> Vec<(Bytes, Value)> {
        self.entries
    }
}

impl IntoIterator for KeyValueSet {
    type Item = (Bytes, Value);
    type IntoIter = std::vec::IntoIter<(Bytes, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(Bytes, Value)> for KeyValueSet {
    fn from_iter<I: IntoIterator<Item = (Bytes, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Decode a key/value set reply payload
///
/// Fields are consumed strictly in order by their declared lengths; the
/// buffer must be consumed exactly.
pub fn decode_key_value_set(payload: Bytes, variant: ProtocolVariant) -> Result<KeyValueSet> {
    let mut reader = PayloadReader::new(payload);
    let count = reader.read_u32()? as usize;

    // Smallest possible element: two empty length fields (+ a tag)
    let min_element = match variant {
        ProtocolVariant::Legacy => 8,
        ProtocolVariant::Encoded => 9,
    };
    if count > reader.remaining() / min_element {
        return Err(GibsonError::Protocol(format!(
            "Key/value set declares {} elements but only {} bytes follow",
            count,
            reader.remaining()
        )));
    }

    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        let key_len = reader.read_u32()? as usize;
        let key = reader.read_bytes(key_len)?;

        let encoding = match variant {
            ProtocolVariant::Legacy => None,
            ProtocolVariant::Encoded => {
                let tag = reader.read_u8()?;
                Some(Encoding::from_u8(tag).ok_or_else(|| {
                    GibsonError::Protocol(format!(
                        "Unknown encoding tag 0x{:02x} in element {}",
                        tag, index
                    ))
                })?)
            }
        };

        let value_len = reader.read_u32()? as usize;
        let raw = reader.read_bytes(value_len)?;

        entries.push((key, decode_value(encoding, raw)?));
    }

    if !reader.is_empty() {
        return Err(GibsonError::Protocol(format!(
            "{} trailing bytes after {} elements",
            reader.remaining(),
            count
        )));
    }

    Ok(KeyValueSet { entries })
}

/// Encode a key/value set payload
///
/// Numbers are written as 8-byte little-endian integers with a numeric tag.
pub fn encode_key_value_set(set: &KeyValueSet, variant: ProtocolVariant) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32_le(set.len() as u32);

    for (key, value) in set.iter() {
        buf.put_u32_le(key.len() as u32);
        buf.put_slice(key);

        let (tag, raw) = match value {
            Value::Bytes(b) => (Encoding::Plain, b.clone()),
            Value::Number(n) => (Encoding::Number, Bytes::copy_from_slice(&n.to_le_bytes())),
        };
        if variant == ProtocolVariant::Encoded {
            buf.put_u8(tag as u8);
        }
        buf.put_u32_le(raw.len() as u32);
        buf.put_slice(&raw);
    }

    buf.freeze()
}
