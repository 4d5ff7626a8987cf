//! Integrity block signing.
//!
//! Every key signs the same preimage inputs: the bundle hash, the block
//! before any signature is added, and that key's own attribute map. The
//! per-key work is therefore independent and runs concurrently; the stack
//! is only mutated once all signatures are in and self-verified, in the
//! order the keys were given.

use futures::future::try_join_all;
use sha2::{Digest, Sha512};
use wbn_bundle::read_trailing_length;
use wbn_cbor::{check_deterministic, CanonicalCodec, CiboriumCodec};

use crate::config::SigningConfig;
use crate::error::{SignError, SignResult};
use crate::integrity_block::{
    attributes_to_value, signature_attributes, signature_preimage, IntegrityBlock,
    IntegrityBlockVersion, IntegritySignature, SignatureAttributes,
};
use crate::keys::KeyType;
use crate::strategy::SigningStrategy;
use crate::web_bundle_id::WebBundleId;

/// Result of signing.
#[derive(Debug, Clone)]
pub struct SignedOutput {
    /// The encoded integrity block alone.
    pub integrity_block: Vec<u8>,
    /// `integrity_block || web_bundle`.
    pub signed_web_bundle: Vec<u8>,
}

/// Signs an unsigned bundle with one or more keys.
///
/// ```no_run
/// # async fn run(bundle: Vec<u8>, strategy: Box<dyn wbn_sign::SigningStrategy>) -> wbn_sign::SignResult<()> {
/// use wbn_sign::IntegrityBlockSigner;
///
/// let output = IntegrityBlockSigner::new(&bundle, vec![strategy]).sign().await?;
/// std::fs::write("app.swbn", &output.signed_web_bundle).ok();
/// # Ok(())
/// # }
/// ```
pub struct IntegrityBlockSigner<'a, C: CanonicalCodec = CiboriumCodec> {
    codec: C,
    web_bundle: &'a [u8],
    strategies: Vec<Box<dyn SigningStrategy>>,
    version: IntegrityBlockVersion,
    web_bundle_id: Option<String>,
    /// Added to every signature's attribute map next to its public key.
    extra_attributes: SignatureAttributes,
}

impl<'a> IntegrityBlockSigner<'a> {
    pub fn new(web_bundle: &'a [u8], strategies: Vec<Box<dyn SigningStrategy>>) -> Self {
        Self::with_codec(web_bundle, strategies, CiboriumCodec)
    }
}

impl<'a, C: CanonicalCodec> IntegrityBlockSigner<'a, C> {
    pub fn with_codec(
        web_bundle: &'a [u8],
        strategies: Vec<Box<dyn SigningStrategy>>,
        codec: C,
    ) -> Self {
        Self {
            codec,
            web_bundle,
            strategies,
            version: IntegrityBlockVersion::default(),
            web_bundle_id: None,
            extra_attributes: SignatureAttributes::new(),
        }
    }

    pub fn with_version(mut self, version: IntegrityBlockVersion) -> Self {
        self.version = version;
        self
    }

    /// Apply the layout selected in `config`.
    pub fn with_config(self, config: &SigningConfig) -> Self {
        self.with_version(config.integrity_block_version)
    }

    /// Identity recorded in a v2 block. Required with more than one key.
    pub fn with_web_bundle_id(mut self, id: impl Into<String>) -> Self {
        self.web_bundle_id = Some(id.into());
        self
    }

    /// Extra signature attribute, covered by every key's signature.
    pub fn with_signature_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.extra_attributes.insert(name.into(), value.into());
        self
    }

    pub async fn sign(&self) -> SignResult<SignedOutput> {
        if self.strategies.is_empty() {
            return Err(SignError::NoSigningKeys);
        }
        if let Some(name) = self
            .extra_attributes
            .keys()
            .find(|name| KeyType::from_attribute_name(name).is_some())
        {
            return Err(SignError::invalid_block(format!(
                "{} is set from the signing key",
                name
            )));
        }
        self.check_unsigned()?;

        let mut block = IntegrityBlock::new(self.version);
        if let Some(id) = self.target_web_bundle_id().await? {
            block.set_web_bundle_id(id)?;
        }

        let bundle_hash = Sha512::digest(self.web_bundle).to_vec();
        let block_cbor = block.to_cbor(&self.codec)?;

        let signatures = try_join_all(
            self.strategies
                .iter()
                .enumerate()
                .map(|(index, strategy)| {
                    self.sign_with(index, strategy.as_ref(), &bundle_hash, &block_cbor)
                }),
        )
        .await?;

        for signature in signatures {
            block.add_signature(signature);
        }

        let integrity_block = block.to_cbor(&self.codec)?;
        let mut signed_web_bundle =
            Vec::with_capacity(integrity_block.len() + self.web_bundle.len());
        signed_web_bundle.extend_from_slice(&integrity_block);
        signed_web_bundle.extend_from_slice(self.web_bundle);

        tracing::info!(
            version = %self.version,
            signatures = block.signatures().len(),
            web_bundle_id = block.web_bundle_id().unwrap_or("-"),
            block_bytes = integrity_block.len(),
            "signed web bundle"
        );

        Ok(SignedOutput {
            integrity_block,
            signed_web_bundle,
        })
    }

    fn check_unsigned(&self) -> SignResult<()> {
        let declared = read_trailing_length(self.web_bundle);
        let actual = self.web_bundle.len() as u64;
        if declared != Some(actual) {
            return Err(SignError::AlreadySigned { declared, actual });
        }
        Ok(())
    }

    /// The id to record: explicit, else derived from the only key (v2).
    async fn target_web_bundle_id(&self) -> SignResult<Option<String>> {
        if let Some(id) = &self.web_bundle_id {
            return Ok(Some(id.clone()));
        }
        if self.version == IntegrityBlockVersion::V1 {
            return Ok(None);
        }
        if self.strategies.len() > 1 {
            return Err(SignError::IdentityRequired {
                keys: self.strategies.len(),
            });
        }
        let public_key = self.strategies[0].public_key().await?;
        let id = WebBundleId::from_public_key(&public_key);
        tracing::debug!(web_bundle_id = %id, "derived web bundle id from signing key");
        Ok(Some(id.as_str().to_string()))
    }

    async fn sign_with(
        &self,
        key_index: usize,
        strategy: &dyn SigningStrategy,
        bundle_hash: &[u8],
        block_cbor: &[u8],
    ) -> SignResult<IntegritySignature> {
        let public_key = strategy.public_key().await?;

        let mut attributes = self.extra_attributes.clone();
        attributes.extend(signature_attributes(&public_key));
        let attributes_cbor = self.codec.encode(&attributes_to_value(&attributes))?;
        check_deterministic(&attributes_cbor)?;

        let preimage = signature_preimage(bundle_hash, block_cbor, &attributes_cbor);
        let signature = strategy.sign(&preimage).await?;

        if let Err(reason) = public_key.verify(&preimage, &signature) {
            tracing::warn!(key_index, key_type = %public_key.key_type(), %reason, "self-verification failed");
            return Err(SignError::SignatureNotVerifiable { key_index });
        }
        tracing::debug!(key_index, key_type = %public_key.key_type(), "signature verified");

        Ok(IntegritySignature {
            public_key,
            attributes,
            signature,
        })
    }
}
