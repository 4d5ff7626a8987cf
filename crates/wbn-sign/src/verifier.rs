//! Signed bundle parsing and signature verification.

use sha2::{Digest, Sha512};
use wbn_bundle::{read_trailing_length, Bundle, BundleError};
use wbn_cbor::{CanonicalCodec, CiboriumCodec};

use crate::error::{SignError, SignResult};
use crate::integrity_block::{signature_preimage, IntegrityBlock};
use crate::keys::PublicKey;

/// A signed bundle split into its integrity block and the bundle bytes.
#[derive(Debug, Clone)]
pub struct SignedWebBundle<'a> {
    integrity_block: IntegrityBlock,
    web_bundle: &'a [u8],
}

impl<'a> SignedWebBundle<'a> {
    pub fn parse(bytes: &'a [u8]) -> SignResult<Self> {
        Self::parse_with(bytes, &CiboriumCodec)
    }

    /// Split `integrity_block || web_bundle`.
    ///
    /// The block must be deterministically encoded and the remaining bytes
    /// must carry a consistent trailing length.
    pub fn parse_with(bytes: &'a [u8], codec: &dyn CanonicalCodec) -> SignResult<Self> {
        let (integrity_block, consumed) = IntegrityBlock::parse_first(bytes, codec)?;
        let web_bundle = &bytes[consumed..];

        let actual = web_bundle.len() as u64;
        match read_trailing_length(web_bundle) {
            Some(declared) if declared == actual => {}
            declared => {
                return Err(BundleError::LengthMismatch {
                    declared: declared.unwrap_or(0),
                    actual,
                }
                .into())
            }
        }

        tracing::debug!(
            version = %integrity_block.version(),
            signatures = integrity_block.signatures().len(),
            block_bytes = consumed,
            "parsed integrity block"
        );
        Ok(Self {
            integrity_block,
            web_bundle,
        })
    }

    pub fn integrity_block(&self) -> &IntegrityBlock {
        &self.integrity_block
    }

    /// The unsigned bundle bytes.
    pub fn web_bundle(&self) -> &'a [u8] {
        self.web_bundle
    }

    /// The identity recorded in a v2 block.
    pub fn web_bundle_id(&self) -> Option<&str> {
        self.integrity_block.web_bundle_id()
    }

    /// Decode the embedded bundle with default limits.
    pub fn bundle(&self) -> SignResult<Bundle> {
        Ok(Bundle::from_bytes(self.web_bundle)?)
    }

    pub fn verify(&self) -> SignResult<Vec<PublicKey>> {
        self.verify_with(&CiboriumCodec)
    }

    /// Verify every signature in stack order, returning the signing keys.
    ///
    /// Each preimage is rebuilt over the block without signatures, which
    /// is the state every key signed.
    pub fn verify_with(&self, codec: &dyn CanonicalCodec) -> SignResult<Vec<PublicKey>> {
        let signatures = self.integrity_block.signatures();
        if signatures.is_empty() {
            return Err(SignError::invalid_block("signature stack is empty"));
        }

        let bundle_hash = Sha512::digest(self.web_bundle).to_vec();
        let block_cbor = self.integrity_block.without_signatures().to_cbor(codec)?;

        let mut keys = Vec::with_capacity(signatures.len());
        for (index, entry) in signatures.iter().enumerate() {
            let attributes_cbor = codec.encode(&entry.attributes_value())?;
            let preimage = signature_preimage(&bundle_hash, &block_cbor, &attributes_cbor);
            entry
                .public_key
                .verify(&preimage, &entry.signature)
                .map_err(|reason| SignError::SignatureInvalid { index, reason })?;
            keys.push(entry.public_key.clone());
        }
        Ok(keys)
    }
}
