//! Web Bundle container codec.
//!
//! Two incompatible layouts are supported, selected by [`FormatVersion`]:
//! `b1` (with a top-level primary URL slot) and `b2` (the default). A
//! [`BundleBuilder`] collects exchanges and seals them into bytes; a
//! [`Bundle`] decodes bytes back with strict validation under
//! [`DecodeLimits`].

pub mod builder;
pub mod bundle;
pub mod error;
pub mod exchange;
pub mod fs;
pub mod limits;
pub mod version;

pub use builder::BundleBuilder;
pub use bundle::{has_consistent_length, read_trailing_length, Bundle};
pub use error::{BundleError, BundleResult, ErrorClass};
pub use exchange::{validate_exchange_url, Exchange, Response};
pub use fs::{ContentTypeResolver, ExtensionContentTypes};
pub use limits::{DecodeLimits, DecodeLimitsOverrides};
pub use version::{FormatVersion, BUNDLE_MAGIC, LENGTH_FIELD_BYTES};
