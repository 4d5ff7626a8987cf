//! Codec boundary between structured [`Value`]s and bytes.
//!
//! Container and signing logic only talks to [`CanonicalCodec`]; the
//! [`CiboriumCodec`] implementation is the one linked in by default.

use crate::value::Value;

/// Errors raised by a [`CanonicalCodec`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("CBOR encode failed: {message}")]
    Encode { message: String },

    #[error("CBOR decode failed: {message}")]
    Decode { message: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("{count} trailing bytes after CBOR item")]
    TrailingBytes { count: usize },

    #[error("unsupported CBOR item: {kind}")]
    Unsupported { kind: String },

    #[error("duplicate map key {key}")]
    DuplicateMapKey { key: String },
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Generic structured-value to bytes encoding.
///
/// `encode` must be canonical by construction (RFC 8949 §4.2.1): shortest
/// argument widths, definite lengths, and map entries sorted by the bytewise
/// order of their encoded keys. Decoding makes no such assumption about its
/// input; run [`check_deterministic`](crate::check_deterministic) for that.
pub trait CanonicalCodec: Send + Sync {
    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>>;

    /// Decode the first item of `bytes`, returning it with the unread tail.
    fn decode_first<'a>(&self, bytes: &'a [u8]) -> CodecResult<(Value, &'a [u8])>;

    /// Decode exactly one item; trailing bytes are an error.
    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        let (value, rest) = self.decode_first(bytes)?;
        if !rest.is_empty() {
            return Err(CodecError::TrailingBytes { count: rest.len() });
        }
        Ok(value)
    }

    /// Byte length of the canonical encoding of `value`.
    fn encoded_len(&self, value: &Value) -> CodecResult<usize> {
        Ok(self.encode(value)?.len())
    }
}

/// [`CanonicalCodec`] backed by `ciborium`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CiboriumCodec;

impl CiboriumCodec {
    pub fn new() -> Self {
        Self
    }
}

impl CanonicalCodec for CiboriumCodec {
    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        let raw = to_ciborium(value)?;
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&raw, &mut buf).map_err(|e| CodecError::Encode {
            message: e.to_string(),
        })?;
        Ok(buf)
    }

    fn decode_first<'a>(&self, bytes: &'a [u8]) -> CodecResult<(Value, &'a [u8])> {
        if bytes.is_empty() {
            return Err(CodecError::UnexpectedEof);
        }
        let mut rest = bytes;
        let raw: ciborium::Value =
            ciborium::de::from_reader(&mut rest).map_err(|e| CodecError::Decode {
                message: e.to_string(),
            })?;
        Ok((from_ciborium(raw)?, rest))
    }
}

fn to_ciborium(value: &Value) -> CodecResult<ciborium::Value> {
    Ok(match value {
        Value::Null => ciborium::Value::Null,
        Value::Unsigned(n) => ciborium::Value::Integer((*n).into()),
        Value::Bytes(b) => ciborium::Value::Bytes(b.clone()),
        Value::Text(s) => ciborium::Value::Text(s.clone()),
        Value::Array(items) => {
            ciborium::Value::Array(items.iter().map(to_ciborium).collect::<CodecResult<_>>()?)
        }
        Value::Map(entries) => {
            let codec = CiboriumCodec;
            let mut keyed = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                keyed.push((codec.encode(k)?, to_ciborium(k)?, to_ciborium(v)?));
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            if let Some(pair) = keyed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                return Err(CodecError::DuplicateMapKey {
                    key: hex::encode(&pair[0].0),
                });
            }
            ciborium::Value::Map(keyed.into_iter().map(|(_, k, v)| (k, v)).collect())
        }
    })
}

fn from_ciborium(raw: ciborium::Value) -> CodecResult<Value> {
    Ok(match raw {
        ciborium::Value::Null => Value::Null,
        ciborium::Value::Integer(i) => {
            Value::Unsigned(u64::try_from(i).map_err(|_| CodecError::Unsupported {
                kind: "negative integer".to_string(),
            })?)
        }
        ciborium::Value::Bytes(b) => Value::Bytes(b),
        ciborium::Value::Text(s) => Value::Text(s),
        ciborium::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(from_ciborium)
                .collect::<CodecResult<_>>()?,
        ),
        ciborium::Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| Ok((from_ciborium(k)?, from_ciborium(v)?)))
                .collect::<CodecResult<_>>()?,
        ),
        ciborium::Value::Float(_) => {
            return Err(CodecError::Unsupported {
                kind: "float".to_string(),
            })
        }
        ciborium::Value::Bool(_) => {
            return Err(CodecError::Unsupported {
                kind: "boolean".to_string(),
            })
        }
        ciborium::Value::Tag(tag, _) => {
            return Err(CodecError::Unsupported {
                kind: format!("tag {}", tag),
            })
        }
        _ => {
            return Err(CodecError::Unsupported {
                kind: "unknown item".to_string(),
            })
        }
    })
}
