//! CBOR support for Web Bundles and integrity blocks.
//!
//! - [`Value`]: the structured subset of CBOR the container formats use
//! - [`CanonicalCodec`]: encoder/decoder boundary, canonical on encode
//! - [`check_deterministic`]: byte-level RFC 8949 §4.2.1 verifier
//!
//! Encoding goes through the codec; verification never does, so a bundle
//! produced by a foreign encoder is checked on its actual bytes.

pub mod codec;
pub mod deterministic;
pub mod value;

pub use codec::{CanonicalCodec, CiboriumCodec, CodecError, CodecResult};
pub use deterministic::{check_deterministic, is_deterministic, DeterminismError, MAX_NESTING_DEPTH};
pub use value::Value;
