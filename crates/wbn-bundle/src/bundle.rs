//! Bundle decoding with strict validation.
//!
//! Nothing embedded in the container is trusted: section lengths are
//! checked against the re-encoded sections, the trailing length against
//! the buffer, and response offsets are derived by walking the
//! `responses` array rather than read from the index.

use std::collections::{HashMap, HashSet};

use wbn_cbor::{check_deterministic, CanonicalCodec, CiboriumCodec, Value};

use crate::error::{BundleError, BundleResult};
use crate::exchange::{split_record, Response};
use crate::limits::DecodeLimits;
use crate::version::{FormatVersion, LENGTH_FIELD_BYTES};

/// Read the trailing 8-byte big-endian length field.
pub fn read_trailing_length(bytes: &[u8]) -> Option<u64> {
    let start = bytes.len().checked_sub(LENGTH_FIELD_BYTES)?;
    let mut field = [0u8; LENGTH_FIELD_BYTES];
    field.copy_from_slice(&bytes[start..]);
    Some(u64::from_be_bytes(field))
}

/// Whether the trailing length field matches the byte length.
///
/// A signed bundle has an integrity block in front, so this is false for it.
pub fn has_consistent_length(bytes: &[u8]) -> bool {
    read_trailing_length(bytes) == Some(bytes.len() as u64)
}

/// A decoded bundle.
#[derive(Debug, Clone)]
pub struct Bundle {
    version: FormatVersion,
    primary_url: Option<String>,
    sections: Vec<(String, Value)>,
    index: Vec<(String, Value)>,
    responses: Vec<Response>,
    /// Offset -> (length, position in `responses`), derived by walking
    /// the `responses` section.
    response_spans: HashMap<u64, (u64, usize)>,
}

impl Bundle {
    /// Decode with [`DecodeLimits::default`].
    pub fn from_bytes(bytes: &[u8]) -> BundleResult<Self> {
        Self::from_bytes_with_limits(bytes, DecodeLimits::default())
    }

    pub fn from_bytes_with_limits(bytes: &[u8], limits: DecodeLimits) -> BundleResult<Self> {
        Self::decode_with(bytes, limits, &CiboriumCodec)
    }

    /// Decode using a caller-supplied codec.
    pub fn decode_with(
        bytes: &[u8],
        limits: DecodeLimits,
        codec: &dyn CanonicalCodec,
    ) -> BundleResult<Self> {
        check_limit("bundle size", limits.max_bundle_bytes, bytes.len() as u64)?;
        if limits.require_deterministic {
            check_deterministic(bytes)?;
        }

        let items = codec
            .decode(bytes)?
            .into_array()
            .map_err(|v| BundleError::malformed(format!("top level must be an array, got {}", v.kind())))?;
        let version = FormatVersion::from_layout_len(items.len())?;
        let top = version.destructure(items)?;
        let declared = FormatVersion::from_wire(&top.version_bytes)?;
        if declared != version {
            return Err(BundleError::VersionLayoutMismatch {
                declared,
                elements: version.top_level_len(),
            });
        }

        let length_field: [u8; LENGTH_FIELD_BYTES] = top
            .length
            .as_slice()
            .try_into()
            .map_err(|_| BundleError::malformed("length field must be 8 bytes"))?;
        let declared_len = u64::from_be_bytes(length_field);
        if declared_len != bytes.len() as u64 {
            return Err(BundleError::LengthMismatch {
                declared: declared_len,
                actual: bytes.len() as u64,
            });
        }

        if limits.require_deterministic {
            check_deterministic(&top.section_lengths)?;
        }
        let sections = pair_sections(codec, &top.section_lengths, top.sections)?;
        let names: Vec<&str> = sections.iter().map(|(n, _)| n.as_str()).collect();
        tracing::debug!(%version, sections = ?names, "decoding bundle");

        let mut bundle = Self {
            version,
            primary_url: top.primary_url,
            sections,
            index: Vec::new(),
            responses: Vec::new(),
            response_spans: HashMap::new(),
        };
        bundle.check_critical()?;
        if version == FormatVersion::B2 {
            bundle.primary_url = match bundle.section("primary") {
                None => None,
                Some(Value::Text(url)) => Some(url.clone()),
                Some(other) => {
                    return Err(BundleError::malformed(format!(
                        "primary section must be a text string, got {}",
                        other.kind()
                    )))
                }
            };
        }
        bundle.load_responses(codec, &limits)?;
        bundle.load_index()?;
        Ok(bundle)
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn primary_url(&self) -> Option<&str> {
        self.primary_url.as_deref()
    }

    /// Manifest URL from the `manifest` section (b1).
    pub fn manifest_url(&self) -> Option<&str> {
        self.section("manifest").and_then(Value::as_text)
    }

    /// URLs in index order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.index.iter().map(|(url, _)| url.as_str())
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, content)| content)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(n, _)| n.as_str())
    }

    /// Resolve the response recorded for `url`.
    pub fn get_response(&self, url: &str) -> BundleResult<&Response> {
        let entry = self
            .index
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, entry)| entry)
            .ok_or_else(|| BundleError::ResponseNotFound {
                url: url.to_string(),
            })?;
        let (offset, length) = self.version.parse_index_entry(url, entry)?;
        self.resolve(url, offset, length)
    }

    /// Check that every index entry addresses exactly one response.
    pub fn verify_index(&self) -> BundleResult<()> {
        for (url, entry) in &self.index {
            let (offset, length) = self.version.parse_index_entry(url, entry)?;
            self.resolve(url, offset, length)?;
        }
        Ok(())
    }

    fn resolve(&self, url: &str, offset: u64, length: u64) -> BundleResult<&Response> {
        let broken = |reason: String| BundleError::InvalidIndexEntry {
            url: url.to_string(),
            reason,
        };
        match self.response_spans.get(&offset) {
            Some((actual, position)) if *actual == length => self
                .responses
                .get(*position)
                .ok_or_else(|| broken(format!("no response at position {}", position))),
            Some((actual, _)) => Err(broken(format!(
                "length {} does not match response length {}",
                length, actual
            ))),
            None => Err(broken(format!("response for {} is not found (broken index)", url))),
        }
    }

    fn check_critical(&self) -> BundleResult<()> {
        let Some(critical) = self.section("critical") else {
            return Ok(());
        };
        let names = critical
            .as_array()
            .ok_or_else(|| BundleError::malformed("critical section must be an array"))?;
        for name in names {
            let name = name
                .as_text()
                .ok_or_else(|| BundleError::malformed("critical section entries must be text"))?;
            if !self.version.recognizes_section(name) {
                return Err(BundleError::UnknownCriticalSection {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn load_responses(&mut self, codec: &dyn CanonicalCodec, limits: &DecodeLimits) -> BundleResult<()> {
        let responses = self
            .section("responses")
            .ok_or_else(|| BundleError::MissingSection {
                name: "responses".to_string(),
            })?;
        let records = responses
            .as_array()
            .ok_or_else(|| BundleError::malformed("responses section must be an array"))?;
        check_limit("exchange count", limits.max_exchanges as u64, records.len() as u64)?;

        let mut spans = HashMap::with_capacity(records.len());
        let mut parsed = Vec::with_capacity(records.len());
        let mut offset = codec.encoded_len(&Value::from(records.len()))? as u64;
        for (position, record) in records.iter().enumerate() {
            let (header_bytes, _) = split_record(record)?;
            check_limit(
                "header map size",
                limits.max_header_bytes as u64,
                header_bytes.len() as u64,
            )?;
            if limits.require_deterministic {
                check_deterministic(header_bytes)?;
            }
            parsed.push(Response::from_value(record, codec)?);
            let length = codec.encoded_len(record)? as u64;
            spans.insert(offset, (length, position));
            offset += length;
        }

        self.responses = parsed;
        self.response_spans = spans;
        Ok(())
    }

    fn load_index(&mut self) -> BundleResult<()> {
        let index = self.section("index").ok_or_else(|| BundleError::MissingSection {
            name: "index".to_string(),
        })?;
        self.index = parse_index(index)?;
        Ok(())
    }
}

fn parse_index(index: &Value) -> BundleResult<Vec<(String, Value)>> {
    let entries = index
        .as_map()
        .ok_or_else(|| BundleError::malformed("index section must be a map"))?;

    let mut seen = HashSet::with_capacity(entries.len());
    let mut parsed = Vec::with_capacity(entries.len());
    for (key, entry) in entries {
        let url = key
            .as_text()
            .ok_or_else(|| BundleError::malformed("index keys must be text"))?;
        if !seen.insert(url) {
            return Err(BundleError::DuplicateExchange {
                url: url.to_string(),
            });
        }
        parsed.push((url.to_string(), entry.clone()));
    }
    Ok(parsed)
}

/// Match section contents with the flat name/length table.
fn pair_sections(
    codec: &dyn CanonicalCodec,
    section_lengths: &[u8],
    contents: Vec<Value>,
) -> BundleResult<Vec<(String, Value)>> {
    let table = codec
        .decode(section_lengths)?
        .into_array()
        .map_err(|_| BundleError::malformed("section lengths must be an array"))?;
    if table.len() != contents.len() * 2 {
        return Err(BundleError::malformed(format!(
            "number of elements in section-lengths ({}) and in sections ({}) don't match",
            table.len(),
            contents.len()
        )));
    }

    let mut sections: Vec<(String, Value)> = Vec::with_capacity(contents.len());
    for (pair, content) in table.chunks_exact(2).zip(contents) {
        let (Some(name), Some(declared)) = (pair[0].as_text(), pair[1].as_unsigned()) else {
            return Err(BundleError::malformed("section lengths must alternate name and length"));
        };
        if sections.iter().any(|(n, _)| n == name) {
            return Err(BundleError::DuplicateSection {
                name: name.to_string(),
            });
        }
        let actual = codec.encoded_len(&content)? as u64;
        if actual != declared {
            return Err(BundleError::SectionLengthMismatch {
                name: name.to_string(),
                declared,
                actual,
            });
        }
        sections.push((name.to_string(), content));
    }
    Ok(sections)
}

fn check_limit(what: &'static str, limit: u64, actual: u64) -> BundleResult<()> {
    if actual > limit {
        return Err(BundleError::LimitExceeded { what, limit, actual });
    }
    Ok(())
}
