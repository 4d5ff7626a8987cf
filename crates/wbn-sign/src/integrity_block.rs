//! Integrity block model and wire format.
//!
//! ```text
//! v1: [magic, "1b\0\0", [signature...]]              newest signature first
//! v2: [magic, "2b\0\0", {attributes}, [signature...]] signatures in key order
//!
//! signature: [{"<keyType>PublicKey": raw_key}, signature_bytes]
//! ```
//!
//! The signed artifact is the encoded block immediately followed by the
//! unsigned bundle.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use wbn_cbor::{check_deterministic, CanonicalCodec, Value};

use crate::error::{SignError, SignResult};
use crate::keys::{KeyType, PublicKey};

/// Integrity block magic: 🖋📦 in UTF-8.
pub const INTEGRITY_BLOCK_MAGIC: [u8; 8] = [0xf0, 0x9f, 0x96, 0x8b, 0xf0, 0x9f, 0x93, 0xa6];

/// V2 attribute naming the bundle's identity.
pub const WEB_BUNDLE_ID_ATTRIBUTE: &str = "webBundleId";

/// Integrity block layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntegrityBlockVersion {
    /// No attributes; new signatures are prepended.
    V1,
    /// Attributes map; new signatures are appended.
    #[default]
    V2,
}

impl IntegrityBlockVersion {
    pub fn wire_bytes(self) -> [u8; 4] {
        match self {
            Self::V1 => *b"1b\0\0",
            Self::V2 => *b"2b\0\0",
        }
    }

    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"1b\0\0" => Some(Self::V1),
            b"2b\0\0" => Some(Self::V2),
            _ => None,
        }
    }

    /// Number of elements in the top-level array.
    pub fn array_len(self) -> usize {
        match self {
            Self::V1 => 3,
            Self::V2 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl fmt::Display for IntegrityBlockVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrityBlockVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            other => Err(format!("unknown integrity block version: {}", other)),
        }
    }
}

/// Signature attributes: text names to byte-string values.
pub type SignatureAttributes = BTreeMap<String, Vec<u8>>;

/// One entry of the signature stack.
///
/// `attributes` is the full map the signature covers; exactly one entry is
/// a public key, mirrored in `public_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegritySignature {
    pub public_key: PublicKey,
    pub attributes: SignatureAttributes,
    pub signature: Vec<u8>,
}

impl IntegritySignature {
    /// Entry whose only attribute is the public key.
    pub fn new(public_key: PublicKey, signature: Vec<u8>) -> Self {
        Self {
            attributes: signature_attributes(&public_key),
            public_key,
            signature,
        }
    }

    /// Entry over an arbitrary attribute map holding exactly one public key.
    pub fn with_attributes(attributes: SignatureAttributes, signature: Vec<u8>) -> SignResult<Self> {
        let mut public_key = None;
        for (name, raw) in &attributes {
            let Some(key_type) = KeyType::from_attribute_name(name) else {
                continue;
            };
            if public_key.is_some() {
                return Err(SignError::invalid_block(
                    "signature carries more than one public key attribute",
                ));
            }
            public_key = Some(PublicKey::from_raw(key_type, raw)?);
        }
        let public_key = public_key
            .ok_or_else(|| SignError::invalid_block("signature has no supported public key attribute"))?;
        Ok(Self {
            public_key,
            attributes,
            signature,
        })
    }

    /// The attribute map as signed, every entry included.
    pub fn attributes_value(&self) -> Value {
        attributes_to_value(&self.attributes)
    }

    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            self.attributes_value(),
            Value::Bytes(self.signature.clone()),
        ])
    }

    pub fn from_value(value: &Value) -> SignResult<Self> {
        let items = value
            .as_array()
            .filter(|items| items.len() == 2)
            .ok_or_else(|| SignError::invalid_block("signature entry must be a 2-element array"))?;
        let map = items[0]
            .as_map()
            .ok_or_else(|| SignError::invalid_block("signature attributes must be a map"))?;

        let mut attributes = SignatureAttributes::new();
        for (name, raw) in map {
            let (Some(name), Some(raw)) = (name.as_text(), raw.as_bytes()) else {
                return Err(SignError::invalid_block(
                    "signature attributes must map text to byte strings",
                ));
            };
            if attributes.insert(name.to_string(), raw.to_vec()).is_some() {
                return Err(SignError::invalid_block(format!(
                    "duplicate signature attribute {}",
                    name
                )));
            }
        }

        let signature = items[1]
            .as_bytes()
            .ok_or_else(|| SignError::invalid_block("signature must be a byte string"))?
            .to_vec();
        Self::with_attributes(attributes, signature)
    }
}

/// The one-entry attribute map `{ attributeName: raw_public_key }`.
pub fn signature_attributes(public_key: &PublicKey) -> SignatureAttributes {
    SignatureAttributes::from([(public_key.attribute_name().to_string(), public_key.raw_bytes())])
}

pub(crate) fn attributes_to_value(attributes: &SignatureAttributes) -> Value {
    Value::Map(
        attributes
            .iter()
            .map(|(name, raw)| (Value::from(name.as_str()), Value::Bytes(raw.clone())))
            .collect(),
    )
}

/// An integrity block: version, block attributes, and the signature stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityBlock {
    version: IntegrityBlockVersion,
    attributes: BTreeMap<String, String>,
    signatures: Vec<IntegritySignature>,
}

impl IntegrityBlock {
    pub fn new(version: IntegrityBlockVersion) -> Self {
        Self {
            version,
            attributes: BTreeMap::new(),
            signatures: Vec::new(),
        }
    }

    pub fn version(&self) -> IntegrityBlockVersion {
        self.version
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn signatures(&self) -> &[IntegritySignature] {
        &self.signatures
    }

    /// Set a block attribute. V1 blocks have no attributes.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) -> SignResult<()> {
        if self.version == IntegrityBlockVersion::V1 {
            return Err(SignError::invalid_block("v1 integrity blocks carry no attributes"));
        }
        self.attributes.insert(name.into(), value.into());
        Ok(())
    }

    pub fn set_web_bundle_id(&mut self, id: impl Into<String>) -> SignResult<()> {
        self.set_attribute(WEB_BUNDLE_ID_ATTRIBUTE, id)
    }

    /// The `webBundleId` attribute, if present.
    pub fn web_bundle_id(&self) -> Option<&str> {
        self.attributes.get(WEB_BUNDLE_ID_ATTRIBUTE).map(String::as_str)
    }

    /// Push a signature: V1 prepends, V2 appends.
    pub fn add_signature(&mut self, signature: IntegritySignature) {
        match self.version {
            IntegrityBlockVersion::V1 => self.signatures.insert(0, signature),
            IntegrityBlockVersion::V2 => self.signatures.push(signature),
        }
    }

    /// The same block with an empty signature stack.
    ///
    /// This is the state every signature's preimage is computed over.
    pub fn without_signatures(&self) -> Self {
        Self {
            version: self.version,
            attributes: self.attributes.clone(),
            signatures: Vec::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut items = vec![
            Value::Bytes(INTEGRITY_BLOCK_MAGIC.to_vec()),
            Value::Bytes(self.version.wire_bytes().to_vec()),
        ];
        if self.version == IntegrityBlockVersion::V2 {
            items.push(Value::Map(
                self.attributes
                    .iter()
                    .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
                    .collect(),
            ));
        }
        items.push(Value::Array(
            self.signatures.iter().map(IntegritySignature::to_value).collect(),
        ));
        Value::Array(items)
    }

    /// Canonical encoding, checked for determinism on its bytes.
    pub fn to_cbor(&self, codec: &dyn CanonicalCodec) -> SignResult<Vec<u8>> {
        let bytes = codec.encode(&self.to_value())?;
        check_deterministic(&bytes)?;
        Ok(bytes)
    }

    pub fn from_value(value: &Value) -> SignResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| SignError::invalid_block(format!("expected array, got {}", value.kind())))?;
        if items.len() < 3 {
            return Err(SignError::invalid_block(format!(
                "expected at least 3 elements, got {}",
                items.len()
            )));
        }
        if items[0].as_bytes() != Some(&INTEGRITY_BLOCK_MAGIC[..]) {
            return Err(SignError::invalid_block("wrong magic"));
        }
        let version = items[1]
            .as_bytes()
            .and_then(IntegrityBlockVersion::from_wire)
            .ok_or_else(|| SignError::invalid_block("unsupported version"))?;
        if items.len() != version.array_len() {
            return Err(SignError::invalid_block(format!(
                "{} block must have {} elements, got {}",
                version,
                version.array_len(),
                items.len()
            )));
        }

        let mut attributes = BTreeMap::new();
        if version == IntegrityBlockVersion::V2 {
            let map = items[2]
                .as_map()
                .ok_or_else(|| SignError::invalid_block("attributes must be a map"))?;
            for (name, value) in map {
                match (name.as_text(), value.as_text()) {
                    (Some(name), Some(value)) => {
                        attributes.insert(name.to_string(), value.to_string());
                    }
                    _ => return Err(SignError::invalid_block("attributes must map text to text")),
                }
            }
        }

        let stack = items[items.len() - 1]
            .as_array()
            .ok_or_else(|| SignError::invalid_block("signature stack must be an array"))?;
        let signatures = stack
            .iter()
            .map(IntegritySignature::from_value)
            .collect::<SignResult<Vec<_>>>()?;

        Ok(Self {
            version,
            attributes,
            signatures,
        })
    }

    /// Decode the block at the start of `bytes`, returning it and the
    /// number of bytes it occupies.
    pub fn parse_first(bytes: &[u8], codec: &dyn CanonicalCodec) -> SignResult<(Self, usize)> {
        let (value, rest) = codec.decode_first(bytes)?;
        let consumed = bytes.len() - rest.len();
        check_deterministic(&bytes[..consumed])?;
        Ok((Self::from_value(&value)?, consumed))
    }
}

/// Build the data a signature covers.
///
/// Three parts in fixed order (bundle hash, integrity block, signature
/// attributes), each preceded by its length as a big-endian u64.
pub fn signature_preimage(bundle_hash: &[u8], block_cbor: &[u8], attributes_cbor: &[u8]) -> Vec<u8> {
    let parts = [bundle_hash, block_cbor, attributes_cbor];
    let total = parts.iter().map(|p| 8 + p.len()).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend_from_slice(&(part.len() as u64).to_be_bytes());
        out.extend_from_slice(part);
    }
    out
}
