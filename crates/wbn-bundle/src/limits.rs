//! Resource limits for decoding untrusted bundles.

use serde::Deserialize;

/// Resource limits applied by [`Bundle::from_bytes_with_limits`](crate::Bundle::from_bytes_with_limits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_bundle_bytes: u64,
    pub max_exchanges: usize,
    pub max_header_bytes: usize,
    /// Run the deterministic-encoding check over the whole buffer and
    /// every embedded header map and section length table.
    pub require_deterministic: bool,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_bundle_bytes: 512 * 1024 * 1024, // 512 MB
            max_exchanges: 100_000,
            max_header_bytes: 64 * 1024, // 64 KB
            require_deterministic: true,
        }
    }
}

/// Partial overrides for `DecodeLimits`. Used for CLI/config JSON parsing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecodeLimitsOverrides {
    pub max_bundle_bytes: Option<u64>,
    pub max_exchanges: Option<usize>,
    pub max_header_bytes: Option<usize>,
    pub require_deterministic: Option<bool>,
}

impl DecodeLimits {
    /// Apply overrides onto these defaults. Only `Some` values override.
    pub fn apply(self, overrides: DecodeLimitsOverrides) -> Self {
        Self {
            max_bundle_bytes: overrides.max_bundle_bytes.unwrap_or(self.max_bundle_bytes),
            max_exchanges: overrides.max_exchanges.unwrap_or(self.max_exchanges),
            max_header_bytes: overrides.max_header_bytes.unwrap_or(self.max_header_bytes),
            require_deterministic: overrides
                .require_deterministic
                .unwrap_or(self.require_deterministic),
        }
    }

    /// Limits that only bound sizes and skip the determinism check.
    pub fn lenient() -> Self {
        Self {
            require_deterministic: false,
            ..Self::default()
        }
    }
}
