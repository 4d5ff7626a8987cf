//! Determinism error types and nesting limit.

use thiserror::Error;

/// Maximum container nesting accepted by the verifier.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Error returned when a byte sequence is not deterministically encoded CBOR.
///
/// `offset` is always the position of the lead byte of the offending item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeterminismError {
    #[error("{value} should not be represented with {width} argument bytes in deterministic CBOR (offset {offset})")]
    NonMinimalArgument {
        offset: usize,
        value: u64,
        width: usize,
    },

    #[error("reserved additional information {info} is not used in deterministic CBOR (offset {offset})")]
    ReservedAdditionalInfo { offset: usize, info: u8 },

    #[error("indefinite-length items are not used in deterministic CBOR (offset {offset})")]
    IndefiniteLength { offset: usize },

    #[error("item header needs {needed} bytes but only {available} remain (offset {offset})")]
    TruncatedHeader {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("string declares {declared} bytes but only {available} remain (offset {offset})")]
    StringExceedsInput {
        offset: usize,
        declared: u64,
        available: usize,
    },

    #[error("container declares {expected} items but input ends after {found} (offset {offset})")]
    TooFewItems {
        offset: usize,
        expected: u64,
        found: u64,
    },

    #[error("map contains duplicate key {key} (offset {offset})")]
    DuplicateKey { offset: usize, key: String },

    #[error("map keys are not in lexicographic order: {current} follows {previous} (offset {offset})")]
    KeysNotOrdered {
        offset: usize,
        previous: String,
        current: String,
    },

    #[error("major type {major_type} is not implemented by the deterministic check (offset {offset})")]
    NotImplemented { offset: usize, major_type: u8 },

    #[error("nesting depth {depth} exceeds maximum {MAX_NESTING_DEPTH} (offset {offset})")]
    NestingTooDeep { offset: usize, depth: usize },
}

impl DeterminismError {
    /// Offset of the lead byte of the offending item.
    pub fn offset(&self) -> usize {
        match self {
            Self::NonMinimalArgument { offset, .. }
            | Self::ReservedAdditionalInfo { offset, .. }
            | Self::IndefiniteLength { offset }
            | Self::TruncatedHeader { offset, .. }
            | Self::StringExceedsInput { offset, .. }
            | Self::TooFewItems { offset, .. }
            | Self::DuplicateKey { offset, .. }
            | Self::KeysNotOrdered { offset, .. }
            | Self::NotImplemented { offset, .. }
            | Self::NestingTooDeep { offset, .. } => *offset,
        }
    }
}
