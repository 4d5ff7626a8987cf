//! Incremental bundle construction.

use std::collections::HashSet;

use wbn_cbor::{CanonicalCodec, CiboriumCodec, Value};

use crate::error::{BundleError, BundleResult};
use crate::exchange::{validate_exchange_url, Exchange};
use crate::version::{FormatVersion, LENGTH_FIELD_BYTES};

/// Sections only `finalize` may write.
const RESERVED_SECTIONS: &[&str] = &["index", "responses"];

/// Builds a bundle one exchange at a time, then seals it with
/// [`finalize`](Self::finalize).
///
/// ```
/// use wbn_bundle::{Bundle, BundleBuilder, FormatVersion};
///
/// let mut builder = BundleBuilder::new(FormatVersion::B2);
/// builder.add_exchange(
///     "https://example.com/",
///     200,
///     [("Content-Type", "text/plain")],
///     b"hello".to_vec(),
/// )?;
/// let bytes = builder.finalize()?;
///
/// let bundle = Bundle::from_bytes(&bytes)?;
/// assert_eq!(bundle.get_response("https://example.com/")?.body, b"hello");
/// # Ok::<(), wbn_bundle::BundleError>(())
/// ```
pub struct BundleBuilder<C: CanonicalCodec = CiboriumCodec> {
    codec: C,
    version: FormatVersion,
    primary_url: Option<String>,
    section_names: Vec<String>,
    /// Flat `[name, length, name, length, ...]` list.
    section_lengths: Vec<Value>,
    sections: Vec<Value>,
    responses: Vec<Value>,
    index: Vec<(String, Value)>,
    urls: HashSet<String>,
    /// Offset of the next response, not counting the responses array header.
    current_offset: u64,
}

impl BundleBuilder {
    pub fn new(version: FormatVersion) -> Self {
        Self::with_codec(version, CiboriumCodec)
    }
}

impl<C: CanonicalCodec> BundleBuilder<C> {
    pub fn with_codec(version: FormatVersion, codec: C) -> Self {
        Self {
            codec,
            version,
            primary_url: None,
            section_names: Vec::new(),
            section_lengths: Vec::new(),
            sections: Vec::new(),
            responses: Vec::new(),
            index: Vec::new(),
            urls: HashSet::new(),
            current_offset: 0,
        }
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn exchange_count(&self) -> usize {
        self.responses.len()
    }

    /// Set the entry-point URL.
    ///
    /// Required for b1, where it must name an added exchange by the time
    /// the bundle is finalized. b2 stores it in a `primary` section.
    pub fn set_primary_url(&mut self, url: &str) -> BundleResult<&mut Self> {
        validate_exchange_url(url)?;
        self.primary_url = Some(url.to_string());
        Ok(self)
    }

    /// Record the manifest URL (b1 only).
    pub fn set_manifest_url(&mut self, url: &str) -> BundleResult<&mut Self> {
        if self.version != FormatVersion::B1 {
            return Err(BundleError::UnsupportedForVersion {
                feature: "manifest URL",
                version: self.version,
            });
        }
        validate_exchange_url(url)?;
        self.push_section("manifest", Value::from(url))?;
        Ok(self)
    }

    /// Add an auxiliary section. Names are unique within a bundle.
    pub fn add_section(&mut self, name: &str, content: Value) -> BundleResult<&mut Self> {
        let reserved = RESERVED_SECTIONS.contains(&name)
            || (self.version == FormatVersion::B2 && name == "primary");
        if reserved {
            return Err(BundleError::ReservedSection {
                name: name.to_string(),
            });
        }
        self.push_section(name, content)?;
        Ok(self)
    }

    /// Validate and append one exchange.
    pub fn add_exchange<I, K, V>(
        &mut self,
        url: &str,
        status: u16,
        headers: I,
        body: Vec<u8>,
    ) -> BundleResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let exchange = Exchange::new(url, status, headers, body)?;
        self.push_exchange(exchange)?;
        Ok(self)
    }

    /// Append an already validated exchange.
    pub fn push_exchange(&mut self, exchange: Exchange) -> BundleResult<&mut Self> {
        if self.urls.contains(&exchange.url) {
            return Err(BundleError::DuplicateExchange { url: exchange.url });
        }
        let record = exchange.response.to_value(&self.codec)?;
        let length = self.codec.encoded_len(&record)? as u64;
        self.index.push((
            exchange.url.clone(),
            self.version.build_index_entry(self.current_offset, length),
        ));
        self.urls.insert(exchange.url);
        self.responses.push(record);
        self.current_offset += length;
        Ok(self)
    }

    /// Seal the bundle and return its bytes.
    pub fn finalize(mut self) -> BundleResult<Vec<u8>> {
        match self.version {
            FormatVersion::B1 => {
                let present = self
                    .primary_url
                    .as_deref()
                    .is_some_and(|p| self.urls.contains(p));
                if !present {
                    return Err(BundleError::PrimaryUrlMissing {
                        url: self.primary_url.clone(),
                    });
                }
            }
            FormatVersion::B2 => {
                if let Some(url) = self.primary_url.clone() {
                    self.push_section("primary", Value::from(url))?;
                }
            }
        }

        let header_len = self
            .codec
            .encoded_len(&Value::from(self.responses.len()))? as u64;
        let mut index = std::mem::take(&mut self.index);
        self.version.update_offsets(&mut index, header_len)?;
        let index_map = Value::Map(
            index
                .into_iter()
                .map(|(url, entry)| (Value::Text(url), entry))
                .collect(),
        );
        let exchange_count = self.responses.len();
        let responses = Value::Array(std::mem::take(&mut self.responses));
        self.push_section("index", index_map)?;
        self.push_section("responses", responses)?;

        let section_lengths = self
            .codec
            .encode(&Value::Array(std::mem::take(&mut self.section_lengths)))?;
        let top_level = self.version.build_top_level(
            self.primary_url.as_deref(),
            section_lengths,
            std::mem::take(&mut self.sections),
        );

        let mut bytes = self.codec.encode(&top_level)?;
        let total = bytes.len();
        if total < LENGTH_FIELD_BYTES {
            return Err(BundleError::malformed("encoded bundle shorter than its length field"));
        }
        bytes[total - LENGTH_FIELD_BYTES..].copy_from_slice(&(total as u64).to_be_bytes());

        tracing::info!(
            version = %self.version,
            exchanges = exchange_count,
            sections = ?self.section_names,
            bytes = total,
            "finalized bundle"
        );
        Ok(bytes)
    }

    fn push_section(&mut self, name: &str, content: Value) -> BundleResult<()> {
        if self.section_names.iter().any(|n| n == name) {
            return Err(BundleError::DuplicateSection {
                name: name.to_string(),
            });
        }
        let length = self.codec.encoded_len(&content)?;
        tracing::debug!(section = name, length, "added section");
        self.section_names.push(name.to_string());
        self.section_lengths.push(Value::from(name));
        self.section_lengths.push(Value::from(length));
        self.sections.push(content);
        Ok(())
    }
}
