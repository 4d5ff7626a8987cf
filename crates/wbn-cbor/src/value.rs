//! Structured CBOR values exchanged with a [`CanonicalCodec`](crate::CanonicalCodec).
//!
//! Only the subset used by Web Bundles and integrity blocks is modelled:
//! unsigned integers, byte and text strings, arrays, maps and `null`.

/// A CBOR data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Simple value `null` (major type 7, value 22).
    Null,
    /// Major type 0.
    Unsigned(u64),
    /// Major type 2.
    Bytes(Vec<u8>),
    /// Major type 3.
    Text(String),
    /// Major type 4.
    Array(Vec<Value>),
    /// Major type 5. Entry order is not significant: canonical encoders
    /// emit entries sorted by their encoded key.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unsigned(_) => "unsigned integer",
            Self::Bytes(_) => "byte string",
            Self::Text(_) => "text string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Self::Unsigned(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn into_array(self) -> Result<Vec<Value>, Value> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(other),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, Value> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(other),
        }
    }

    pub fn into_text(self) -> Result<String, Value> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(other),
        }
    }

    /// Look up a map entry by text key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Unsigned(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Unsigned(n as u64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_finds_text_key() {
        let map = Value::Map(vec![
            (Value::from("a"), Value::from(1u64)),
            (Value::from("b"), Value::from("two")),
        ]);
        assert_eq!(map.get("b"), Some(&Value::from("two")));
        assert_eq!(map.get("c"), None);
        assert_eq!(Value::Null.get("a"), None);
    }

    #[test]
    fn test_into_conversions_return_original_on_mismatch() {
        let v = Value::from("text");
        let back = v.clone().into_bytes().unwrap_err();
        assert_eq!(back, v);
        assert_eq!(v.into_text().unwrap(), "text");
    }
}
