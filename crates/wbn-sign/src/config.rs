//! Signing configuration.

use crate::integrity_block::IntegrityBlockVersion;

/// Environment variable holding the passphrase for encrypted PKCS#8 keys.
pub const PASSPHRASE_ENV: &str = "WEB_BUNDLE_SIGNING_PASSPHRASE";

/// Environment variable selecting the integrity block layout (`v1` or `v2`).
pub const INTEGRITY_BLOCK_VERSION_ENV: &str = "WEB_BUNDLE_INTEGRITY_BLOCK_VERSION";

/// Configuration for key loading and signing.
#[derive(Clone, Default)]
pub struct SigningConfig {
    /// Passphrase for encrypted private keys.
    pub passphrase: Option<String>,

    /// Integrity block layout to produce.
    pub integrity_block_version: IntegrityBlockVersion,
}

impl SigningConfig {
    /// Create from environment variables.
    ///
    /// An unrecognized block version falls back to the default with a
    /// warning; an empty passphrase counts as unset.
    pub fn from_env() -> Self {
        let passphrase = std::env::var(PASSPHRASE_ENV)
            .ok()
            .filter(|p| !p.is_empty());

        let integrity_block_version = match std::env::var(INTEGRITY_BLOCK_VERSION_ENV) {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %raw,
                    "unknown {}, using {}",
                    INTEGRITY_BLOCK_VERSION_ENV,
                    IntegrityBlockVersion::default()
                );
                IntegrityBlockVersion::default()
            }),
            Err(_) => IntegrityBlockVersion::default(),
        };

        Self {
            passphrase,
            integrity_block_version,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_integrity_block_version(mut self, version: IntegrityBlockVersion) -> Self {
        self.integrity_block_version = version;
        self
    }
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("integrity_block_version", &self.integrity_block_version)
            .finish()
    }
}
