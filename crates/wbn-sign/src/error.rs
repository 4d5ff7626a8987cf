//! Error types for signing and verification.

use std::path::PathBuf;

use wbn_bundle::{BundleError, ErrorClass};
use wbn_cbor::{CodecError, DeterminismError};

/// Signing errors.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// Trailing length field does not match: the input already carries an
    /// integrity block.
    #[error("bundle is already signed: length field says {declared:?}, actual length is {actual}")]
    AlreadySigned { declared: Option<u64>, actual: u64 },

    /// More than one key and no explicit Web Bundle Id.
    #[error("a web bundle id must be given when signing with {keys} keys")]
    IdentityRequired { keys: usize },

    #[error("no signing keys supplied")]
    NoSigningKeys,

    #[error("unsupported key type: {algorithm}")]
    UnsupportedKeyType { algorithm: String },

    /// A strategy produced a signature its own public key rejects.
    #[error("signature from key {key_index} does not verify against its public key")]
    SignatureNotVerifiable { key_index: usize },

    /// Signature in a parsed integrity block does not verify.
    #[error("signature {index} is invalid: {reason}")]
    SignatureInvalid { index: usize, reason: String },

    #[error("signing strategy failed: {message}")]
    Strategy { message: String },

    #[error("failed to parse key: {message}")]
    KeyParse { message: String },

    #[error("private key is encrypted and no passphrase is available")]
    PassphraseRequired,

    #[error("invalid integrity block: {message}")]
    InvalidIntegrityBlock { message: String },

    #[error("invalid web bundle id {id:?}: {reason}")]
    InvalidWebBundleId { id: String, reason: String },

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("non-deterministic encoding: {0}")]
    Determinism(#[from] DeterminismError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SignError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::SignatureNotVerifiable { .. }
            | Self::SignatureInvalid { .. }
            | Self::Strategy { .. } => ErrorClass::Cryptographic,
            Self::Determinism(_) => ErrorClass::Determinism,
            Self::Bundle(e) => e.class(),
            Self::Io { .. } => ErrorClass::Io,
            _ => ErrorClass::Validation,
        }
    }

    pub(crate) fn key_parse(message: impl Into<String>) -> Self {
        Self::KeyParse {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_block(message: impl Into<String>) -> Self {
        Self::InvalidIntegrityBlock {
            message: message.into(),
        }
    }

    pub fn strategy(message: impl Into<String>) -> Self {
        Self::Strategy {
            message: message.into(),
        }
    }
}

/// Result type for signing operations.
pub type SignResult<T> = std::result::Result<T, SignError>;
