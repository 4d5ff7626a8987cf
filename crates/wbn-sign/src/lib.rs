//! Integrity block signing for Web Bundles.
//!
//! An unsigned bundle is signed by prepending an integrity block that
//! carries one signature per key. Keys sit behind [`SigningStrategy`], so
//! in-memory keys and remote key services are interchangeable.
//!
//! - [`IntegrityBlockSigner`]: produces `integrity_block || bundle`
//! - [`SignedWebBundle`]: splits and verifies a signed bundle
//! - [`WebBundleId`]: the identity derived from a public key
//!
//! # Configuration
//!
//! [`SigningConfig::from_env`] reads:
//! - `WEB_BUNDLE_SIGNING_PASSPHRASE`: passphrase for encrypted PKCS#8 keys
//! - `WEB_BUNDLE_INTEGRITY_BLOCK_VERSION`: `v1` or `v2` (default)

pub mod config;
pub mod error;
pub mod integrity_block;
pub mod keys;
pub mod pem;
pub mod signer;
pub mod strategy;
pub mod verifier;
pub mod web_bundle_id;

pub use config::SigningConfig;
pub use error::{SignError, SignResult};
pub use integrity_block::{
    signature_attributes, signature_preimage, IntegrityBlock, IntegrityBlockVersion,
    IntegritySignature, SignatureAttributes, INTEGRITY_BLOCK_MAGIC,
};
pub use keys::{compress_p256_point, KeyType, PublicKey};
pub use pem::{
    load_private_key, parse_encrypted_pem_private_key, parse_pem_private_key,
    read_private_key_file, PassphraseProvider, PrivateKey,
};
pub use signer::{IntegrityBlockSigner, SignedOutput};
pub use strategy::{EcdsaP256SigningStrategy, Ed25519SigningStrategy, SigningStrategy};
pub use verifier::SignedWebBundle;
pub use web_bundle_id::WebBundleId;
