//! Format versions and their top-level layouts.
//!
//! ```text
//! b1: [magic, "b1\0\0", primary_url, section_lengths, sections, length]
//! b2: [magic, "b2\0\0",              section_lengths, sections, length]
//! ```
//!
//! Everything that differs between the two layouts is matched here so the
//! builder and decoder stay version-agnostic.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use wbn_cbor::Value;

use crate::error::{BundleError, BundleResult};

/// "🌐📦" in UTF-8.
pub const BUNDLE_MAGIC: [u8; 8] = [0xf0, 0x9f, 0x8c, 0x90, 0xf0, 0x9f, 0x93, 0xa6];

/// Width of the trailing big-endian length field.
pub const LENGTH_FIELD_BYTES: usize = 8;

const B1_SECTIONS: &[&str] = &["critical", "index", "manifest", "responses", "signatures"];
const B2_SECTIONS: &[&str] = &["critical", "index", "primary", "responses", "signatures"];

/// Bundle format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatVersion {
    B1,
    #[default]
    B2,
}

/// Top-level array split into its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevel {
    pub version_bytes: Vec<u8>,
    /// b1 only; `None` for b2 and for a b1 `null` slot.
    pub primary_url: Option<String>,
    pub section_lengths: Vec<u8>,
    pub sections: Vec<Value>,
    pub length: Vec<u8>,
}

impl FormatVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::B1 => "b1",
            Self::B2 => "b2",
        }
    }

    /// Version field as written: ASCII name NUL-padded to 4 bytes.
    pub fn wire_bytes(self) -> [u8; 4] {
        let name = self.as_str().as_bytes();
        [name[0], name[1], 0, 0]
    }

    /// Parse a version field, stripping trailing NUL padding.
    pub fn from_wire(bytes: &[u8]) -> BundleResult<Self> {
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let name = &bytes[..end];
        match name {
            b"b1" => Ok(Self::B1),
            b"b2" => Ok(Self::B2),
            _ => Err(BundleError::UnsupportedVersion {
                found: String::from_utf8_lossy(name).into_owned(),
            }),
        }
    }

    /// Layout implied by the element count of a top-level array.
    pub fn from_layout_len(elements: usize) -> BundleResult<Self> {
        match elements {
            6 => Ok(Self::B1),
            5 => Ok(Self::B2),
            n => Err(BundleError::malformed(format!(
                "wrong toplevel structure: {} elements",
                n
            ))),
        }
    }

    pub fn top_level_len(self) -> usize {
        match self {
            Self::B1 => 6,
            Self::B2 => 5,
        }
    }

    /// Names a decoder of this version understands in a `critical` section.
    pub fn recognized_sections(self) -> &'static [&'static str] {
        match self {
            Self::B1 => B1_SECTIONS,
            Self::B2 => B2_SECTIONS,
        }
    }

    pub fn recognizes_section(self, name: &str) -> bool {
        self.recognized_sections().contains(&name)
    }

    /// Split a decoded top-level array into its fields.
    pub fn destructure(self, items: Vec<Value>) -> BundleResult<TopLevel> {
        if items.len() != self.top_level_len() {
            return Err(BundleError::VersionLayoutMismatch {
                declared: self,
                elements: items.len(),
            });
        }
        let mut items = items.into_iter();
        let mut next = |field: &str| {
            items
                .next()
                .ok_or_else(|| BundleError::malformed(format!("missing {}", field)))
        };

        let magic = expect_bytes(next("magic")?, "magic")?;
        if magic != BUNDLE_MAGIC {
            return Err(BundleError::InvalidMagic);
        }
        let version_bytes = expect_bytes(next("version")?, "version")?;
        let primary_url = match self {
            Self::B1 => match next("primary URL")? {
                Value::Null => None,
                Value::Text(url) => Some(url),
                other => {
                    return Err(BundleError::malformed(format!(
                        "primary URL must be a text string, got {}",
                        other.kind()
                    )))
                }
            },
            Self::B2 => None,
        };
        let section_lengths = expect_bytes(next("section lengths")?, "section lengths")?;
        let sections = next("sections")?
            .into_array()
            .map_err(|v| BundleError::malformed(format!("sections must be an array, got {}", v.kind())))?;
        let length = expect_bytes(next("length")?, "length")?;

        Ok(TopLevel {
            version_bytes,
            primary_url,
            section_lengths,
            sections,
            length,
        })
    }

    /// Assemble the top-level array with a zeroed length placeholder.
    pub fn build_top_level(
        self,
        primary_url: Option<&str>,
        section_lengths: Vec<u8>,
        sections: Vec<Value>,
    ) -> Value {
        let mut items = vec![
            Value::Bytes(BUNDLE_MAGIC.to_vec()),
            Value::Bytes(self.wire_bytes().to_vec()),
        ];
        if self == Self::B1 {
            items.push(primary_url.map_or(Value::Null, Value::from));
        }
        items.push(Value::Bytes(section_lengths));
        items.push(Value::Array(sections));
        items.push(Value::Bytes(vec![0; LENGTH_FIELD_BYTES]));
        Value::Array(items)
    }

    /// Index entry for a response at `offset` spanning `length` bytes.
    ///
    /// b1 carries an empty variants value in front of the location.
    pub fn build_index_entry(self, offset: u64, length: u64) -> Value {
        match self {
            Self::B1 => Value::Array(vec![
                Value::Bytes(Vec::new()),
                Value::Unsigned(offset),
                Value::Unsigned(length),
            ]),
            Self::B2 => Value::Array(vec![Value::Unsigned(offset), Value::Unsigned(length)]),
        }
    }

    /// Read `(offset, length)` back out of an index entry.
    pub fn parse_index_entry(self, url: &str, entry: &Value) -> BundleResult<(u64, u64)> {
        let invalid = |reason: &str| BundleError::InvalidIndexEntry {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        let items = entry.as_array().ok_or_else(|| invalid("entry is not an array"))?;
        let location = match self {
            Self::B1 => {
                if items.len() != 3 {
                    return Err(invalid("unexpected length of index entry"));
                }
                match items[0].as_bytes() {
                    Some([]) => {}
                    Some(_) => return Err(invalid("variants are not supported")),
                    None => return Err(invalid("variants value must be a byte string")),
                }
                &items[1..]
            }
            Self::B2 => {
                if items.len() != 2 {
                    return Err(invalid("unexpected length of index entry"));
                }
                &items[..]
            }
        };
        match (location[0].as_unsigned(), location[1].as_unsigned()) {
            (Some(offset), Some(length)) => Ok((offset, length)),
            _ => Err(invalid("offset and length must be unsigned integers")),
        }
    }

    /// Shift every entry's offset by `delta` bytes.
    pub fn update_offsets(self, entries: &mut [(String, Value)], delta: u64) -> BundleResult<()> {
        let slot = match self {
            Self::B1 => 1,
            Self::B2 => 0,
        };
        for (url, entry) in entries.iter_mut() {
            let offset = match entry {
                Value::Array(items) => items.get_mut(slot),
                _ => None,
            };
            match offset {
                Some(Value::Unsigned(n)) => *n += delta,
                _ => {
                    return Err(BundleError::InvalidIndexEntry {
                        url: url.clone(),
                        reason: "no offset slot".to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

fn expect_bytes(value: Value, field: &str) -> BundleResult<Vec<u8>> {
    value.into_bytes().map_err(|v| {
        BundleError::malformed(format!("{} must be a byte string, got {}", field, v.kind()))
    })
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatVersion {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_bytes_round_trip() {
        assert_eq!(FormatVersion::B1.wire_bytes(), *b"b1\0\0");
        assert_eq!(FormatVersion::from_wire(b"b2\0\0").unwrap(), FormatVersion::B2);
        assert!(matches!(
            FormatVersion::from_wire(b"b3\0\0"),
            Err(BundleError::UnsupportedVersion { found }) if found == "b3"
        ));
        assert_eq!(FormatVersion::default(), FormatVersion::B2);
        assert_eq!("b1".parse::<FormatVersion>().unwrap(), FormatVersion::B1);
    }

    #[test]
    fn test_index_entry_shapes() {
        let b1 = FormatVersion::B1.build_index_entry(5, 10);
        assert_eq!(b1.as_array().unwrap().len(), 3);
        assert_eq!(FormatVersion::B1.parse_index_entry("u", &b1).unwrap(), (5, 10));

        let b2 = FormatVersion::B2.build_index_entry(5, 10);
        assert_eq!(FormatVersion::B2.parse_index_entry("u", &b2).unwrap(), (5, 10));

        // b2 reader must not accept a b1 entry
        assert!(FormatVersion::B2.parse_index_entry("u", &b1).is_err());
    }

    #[test]
    fn test_variants_rejected() {
        let entry = Value::Array(vec![
            Value::Bytes(vec![1]),
            Value::Unsigned(0),
            Value::Unsigned(1),
        ]);
        let err = FormatVersion::B1.parse_index_entry("https://a/", &entry).unwrap_err();
        assert!(err.to_string().contains("variants are not supported"));
    }

    #[test]
    fn test_update_offsets_uses_version_slot() {
        for version in [FormatVersion::B1, FormatVersion::B2] {
            let mut entries = vec![("https://a/".to_string(), version.build_index_entry(0, 7))];
            version.update_offsets(&mut entries, 2).unwrap();
            assert_eq!(version.parse_index_entry("https://a/", &entries[0].1).unwrap(), (2, 7));
        }
    }

    #[test]
    fn test_top_level_shape() {
        let top = FormatVersion::B1.build_top_level(Some("https://a/"), vec![0x80], vec![]);
        let items = top.into_array().unwrap();
        assert_eq!(items.len(), 6);
        assert_eq!(items[2], Value::from("https://a/"));

        let parsed = FormatVersion::B1.destructure(items).unwrap();
        assert_eq!(parsed.primary_url.as_deref(), Some("https://a/"));
        assert_eq!(parsed.length, vec![0; 8]);

        let top = FormatVersion::B2.build_top_level(None, vec![0x80], vec![]);
        let items = top.into_array().unwrap();
        assert!(matches!(
            FormatVersion::B1.destructure(items),
            Err(BundleError::VersionLayoutMismatch { elements: 5, .. })
        ));
    }

    #[test]
    fn test_recognized_sections() {
        assert!(FormatVersion::B1.recognizes_section("manifest"));
        assert!(!FormatVersion::B2.recognizes_section("manifest"));
        assert!(FormatVersion::B2.recognizes_section("signatures"));
        assert!(!FormatVersion::B1.recognizes_section("unknown"));
    }
}
