//! Signing strategies.
//!
//! A [`SigningStrategy`] holds (or fronts) one private key. The signer only
//! needs the public key and a way to sign a preimage, so remote key
//! services plug in behind the same trait as the in-memory keys below.

use async_trait::async_trait;

use crate::error::SignResult;
use crate::keys::PublicKey;

/// Capability to sign integrity block preimages with one key.
#[async_trait]
pub trait SigningStrategy: Send + Sync {
    /// Sign `data`. ECDSA strategies return an ASN.1 DER signature,
    /// Ed25519 strategies the raw 64 bytes.
    async fn sign(&self, data: &[u8]) -> SignResult<Vec<u8>>;

    /// Public half of the signing key.
    async fn public_key(&self) -> SignResult<PublicKey>;
}

/// In-memory Ed25519 key.
pub struct Ed25519SigningStrategy {
    key: ed25519_dalek::SigningKey,
}

impl Ed25519SigningStrategy {
    pub fn new(key: ed25519_dalek::SigningKey) -> Self {
        Self { key }
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self::new(ed25519_dalek::SigningKey::from_bytes(secret))
    }
}

impl std::fmt::Debug for Ed25519SigningStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519SigningStrategy")
            .field("public_key", &hex::encode(self.key.verifying_key().as_bytes()))
            .finish()
    }
}

#[async_trait]
impl SigningStrategy for Ed25519SigningStrategy {
    async fn sign(&self, data: &[u8]) -> SignResult<Vec<u8>> {
        use ed25519_dalek::Signer;
        Ok(self.key.sign(data).to_bytes().to_vec())
    }

    async fn public_key(&self) -> SignResult<PublicKey> {
        Ok(PublicKey::Ed25519(self.key.verifying_key()))
    }
}

/// In-memory ECDSA P-256 key, signing with SHA-256.
pub struct EcdsaP256SigningStrategy {
    key: p256::ecdsa::SigningKey,
}

impl EcdsaP256SigningStrategy {
    pub fn new(key: p256::ecdsa::SigningKey) -> Self {
        Self { key }
    }
}

impl std::fmt::Debug for EcdsaP256SigningStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let point = self.key.verifying_key().to_encoded_point(true);
        f.debug_struct("EcdsaP256SigningStrategy")
            .field("public_key", &hex::encode(point.as_bytes()))
            .finish()
    }
}

#[async_trait]
impl SigningStrategy for EcdsaP256SigningStrategy {
    async fn sign(&self, data: &[u8]) -> SignResult<Vec<u8>> {
        use p256::ecdsa::signature::Signer;
        let signature: p256::ecdsa::Signature = self.key.sign(data);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    async fn public_key(&self) -> SignResult<PublicKey> {
        Ok(PublicKey::EcdsaP256(*self.key.verifying_key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyType;

    #[tokio::test]
    async fn test_ed25519_signature_verifies() {
        let strategy = Ed25519SigningStrategy::from_bytes(&[3u8; 32]);
        let sig = strategy.sign(b"preimage").await.unwrap();
        assert_eq!(sig.len(), 64);
        let key = strategy.public_key().await.unwrap();
        assert_eq!(key.key_type(), KeyType::Ed25519);
        assert!(key.verify(b"preimage", &sig).is_ok());
        assert!(key.verify(b"other", &sig).is_err());
    }

    #[tokio::test]
    async fn test_ecdsa_signature_is_der() {
        let key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let strategy = EcdsaP256SigningStrategy::new(key);
        let sig = strategy.sign(b"preimage").await.unwrap();
        // DER SEQUENCE
        assert_eq!(sig[0], 0x30);
        let public = strategy.public_key().await.unwrap();
        assert!(public.verify(b"preimage", &sig).is_ok());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let strategy = Ed25519SigningStrategy::from_bytes(&[0x11; 32]);
        let debug = format!("{:?}", strategy);
        assert!(!debug.contains(&hex::encode([0x11u8; 32])));
        assert!(debug.contains("public_key"));
    }
}
