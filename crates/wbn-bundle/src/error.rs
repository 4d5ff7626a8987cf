//! Error types for building and decoding bundles.

use std::path::PathBuf;

use wbn_cbor::{CodecError, DeterminismError};

use crate::version::FormatVersion;

/// Coarse error classification, stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input or a rejected builder call.
    Validation,
    /// Bytes are not deterministically encoded.
    Determinism,
    /// Signature or key material problem.
    Cryptographic,
    /// Resource limit exceeded (DoS prevention).
    Limits,
    /// Filesystem access failed.
    Io,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Bundle errors.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Exchange URL rejected.
    #[error("invalid exchange URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid status code {status}: must be in 100..=999")]
    InvalidStatus { status: u16 },

    /// Non-empty body without a content-type header.
    #[error("non-empty exchange for {url} must have a content-type header")]
    MissingContentType { url: String },

    #[error("pseudo-header {name} cannot be set by the caller")]
    PseudoHeader { name: String },

    /// Same header name given twice with values that differ beyond casing.
    #[error("conflicting values for header {name}: {existing:?} and {value:?}")]
    ConflictingHeader {
        name: String,
        existing: String,
        value: String,
    },

    #[error("duplicate exchange for {url}")]
    DuplicateExchange { url: String },

    #[error("duplicated section: {name}")]
    DuplicateSection { name: String },

    #[error("section {name} is written by finalize and cannot be added directly")]
    ReservedSection { name: String },

    #[error("{feature} is not supported by format version {version}")]
    UnsupportedForVersion {
        feature: &'static str,
        version: FormatVersion,
    },

    /// b1 needs a primary URL that names an added exchange.
    #[error("exchange for primary URL ({}) does not exist", url.as_deref().unwrap_or("unset"))]
    PrimaryUrlMissing { url: Option<String> },

    #[error("wrong magic")]
    InvalidMagic,

    #[error("unsupported format version {found:?}")]
    UnsupportedVersion { found: String },

    /// Version bytes disagree with the top-level layout.
    #[error("version {declared} does not match a {elements}-element top-level array")]
    VersionLayoutMismatch {
        declared: FormatVersion,
        elements: usize,
    },

    #[error("malformed bundle: {message}")]
    Malformed { message: String },

    #[error("section {name} declares {declared} bytes but encodes to {actual}")]
    SectionLengthMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },

    /// Trailing length field disagrees with the byte length.
    #[error("length field says {declared} bytes but bundle is {actual} bytes")]
    LengthMismatch { declared: u64, actual: u64 },

    #[error("missing required section: {name}")]
    MissingSection { name: String },

    #[error("critical section {name} is not understood")]
    UnknownCriticalSection { name: String },

    #[error("no entry for {url}")]
    ResponseNotFound { url: String },

    #[error("broken index entry for {url}: {reason}")]
    InvalidIndexEntry { url: String, reason: String },

    #[error("invalid response header map: {reason}")]
    InvalidHeaderMap { reason: String },

    #[error("{what} limit exceeded: {actual} > {limit}")]
    LimitExceeded {
        what: &'static str,
        limit: u64,
        actual: u64,
    },

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

impl BundleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Determinism(_) => ErrorClass::Determinism,
            Self::LimitExceeded { .. } => ErrorClass::Limits,
            Self::Io { .. } => ErrorClass::Io,
            _ => ErrorClass::Validation,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for bundle operations.
pub type BundleResult<T> = std::result::Result<T, BundleError>;
