//! Public key types accepted in integrity blocks.

use std::fmt;

use ed25519_dalek::Verifier as _;
use pkcs8::DecodePublicKey;

use crate::error::{SignError, SignResult};

pub const ED25519_ATTRIBUTE_NAME: &str = "ed25519PublicKey";
pub const ECDSA_P256_ATTRIBUTE_NAME: &str = "ecdsaP256SHA256PublicKey";

/// Length of an uncompressed SEC1 P-256 point (`04 || x || y`).
const P256_UNCOMPRESSED_LEN: usize = 65;
const P256_COORDINATE_LEN: usize = 32;

/// Closed set of supported signing key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Ed25519,
    EcdsaP256,
}

impl KeyType {
    /// Signature attribute carrying the raw public key.
    pub fn attribute_name(self) -> &'static str {
        match self {
            Self::Ed25519 => ED25519_ATTRIBUTE_NAME,
            Self::EcdsaP256 => ECDSA_P256_ATTRIBUTE_NAME,
        }
    }

    pub fn from_attribute_name(name: &str) -> Option<Self> {
        match name {
            ED25519_ATTRIBUTE_NAME => Some(Self::Ed25519),
            ECDSA_P256_ATTRIBUTE_NAME => Some(Self::EcdsaP256),
            _ => None,
        }
    }

    /// Length of the raw public key as stored in attributes.
    pub fn raw_key_len(self) -> usize {
        match self {
            Self::Ed25519 => 32,
            Self::EcdsaP256 => 33,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => f.write_str("ed25519"),
            Self::EcdsaP256 => f.write_str("ecdsa-p256"),
        }
    }
}

/// A verifying key of one of the supported types.
#[derive(Debug, Clone)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    EcdsaP256(p256::ecdsa::VerifyingKey),
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Ed25519(_) => KeyType::Ed25519,
            Self::EcdsaP256(_) => KeyType::EcdsaP256,
        }
    }

    pub fn attribute_name(&self) -> &'static str {
        self.key_type().attribute_name()
    }

    /// Raw key bytes: 32 bytes for Ed25519, the 33-byte compressed point
    /// for P-256.
    pub fn raw_bytes(&self) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => key.to_bytes().to_vec(),
            Self::EcdsaP256(key) => {
                let uncompressed = key.to_encoded_point(false);
                match compress_p256_point(uncompressed.as_bytes()) {
                    Ok(compressed) => compressed.to_vec(),
                    // to_encoded_point(false) is always 65 bytes
                    Err(_) => key.to_encoded_point(true).as_bytes().to_vec(),
                }
            }
        }
    }

    /// Rebuild a key from its raw attribute bytes.
    pub fn from_raw(key_type: KeyType, bytes: &[u8]) -> SignResult<Self> {
        match key_type {
            KeyType::Ed25519 => {
                let raw: [u8; 32] = bytes.try_into().map_err(|_| {
                    SignError::key_parse(format!("ed25519 key must be 32 bytes, got {}", bytes.len()))
                })?;
                ed25519_dalek::VerifyingKey::from_bytes(&raw)
                    .map(Self::Ed25519)
                    .map_err(|e| SignError::key_parse(format!("invalid ed25519 key: {}", e)))
            }
            KeyType::EcdsaP256 => {
                if bytes.len() != KeyType::EcdsaP256.raw_key_len() {
                    return Err(SignError::key_parse(format!(
                        "P-256 key must be a 33-byte compressed point, got {} bytes",
                        bytes.len()
                    )));
                }
                p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .map(Self::EcdsaP256)
                    .map_err(|e| SignError::key_parse(format!("invalid P-256 point: {}", e)))
            }
        }
    }

    /// Parse a DER-encoded SubjectPublicKeyInfo.
    pub fn from_public_key_der(der: &[u8]) -> SignResult<Self> {
        if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_der(der) {
            return Ok(Self::Ed25519(key));
        }
        if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_der(der) {
            return Ok(Self::EcdsaP256(key));
        }
        let info = pkcs8::spki::SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| SignError::key_parse(format!("not a SubjectPublicKeyInfo: {}", e)))?;
        Err(SignError::UnsupportedKeyType {
            algorithm: info.algorithm.oid.to_string(),
        })
    }

    /// Parse a PEM `PUBLIC KEY` block.
    pub fn from_public_key_pem(pem: &str) -> SignResult<Self> {
        let (label, der) = pkcs8::der::pem::decode_vec(pem.as_bytes())
            .map_err(|e| SignError::key_parse(format!("invalid PEM: {}", e)))?;
        if label != "PUBLIC KEY" {
            return Err(SignError::key_parse(format!(
                "expected a PUBLIC KEY block, got {}",
                label
            )));
        }
        Self::from_public_key_der(&der)
    }

    /// Verify `signature` over `message`.
    ///
    /// Ed25519 signatures are 64 raw bytes; ECDSA signatures are ASN.1 DER.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), String> {
        match self {
            Self::Ed25519(key) => {
                let sig = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|e| format!("malformed ed25519 signature: {}", e))?;
                key.verify(message, &sig)
                    .map_err(|_| "ed25519 verification failed".to_string())
            }
            Self::EcdsaP256(key) => {
                let sig = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|e| format!("malformed DER signature: {}", e))?;
                key.verify(message, &sig)
                    .map_err(|_| "ecdsa-p256 verification failed".to_string())
            }
        }
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_type() == other.key_type() && self.raw_bytes() == other.raw_bytes()
    }
}

impl Eq for PublicKey {}

/// Compress an uncompressed SEC1 P-256 point to 33 bytes.
///
/// Takes the trailing 65 bytes of `encoded`, so a SubjectPublicKeyInfo
/// export works as well as a bare point.
pub fn compress_p256_point(encoded: &[u8]) -> SignResult<[u8; 33]> {
    let start = encoded.len().checked_sub(P256_UNCOMPRESSED_LEN).ok_or_else(|| {
        SignError::key_parse(format!(
            "uncompressed P-256 point needs {} bytes, got {}",
            P256_UNCOMPRESSED_LEN,
            encoded.len()
        ))
    })?;
    let point = &encoded[start..];
    if point[0] != 0x04 {
        return Err(SignError::key_parse("P-256 point is not uncompressed"));
    }
    let x = &point[1..1 + P256_COORDINATE_LEN];
    let y = &point[1 + P256_COORDINATE_LEN..];

    let mut compressed = [0u8; 33];
    compressed[0] = 0x02 | (y[P256_COORDINATE_LEN - 1] & 0x01);
    compressed[1..].copy_from_slice(x);
    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const P256_SCALAR: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";
    const P256_COMPRESSED: &str =
        "0360fed4ba255a9d31c961eb74c6356d68c049b8923b61fa6ce669622e60f29fb6";

    fn p256_key() -> p256::ecdsa::SigningKey {
        p256::ecdsa::SigningKey::from_slice(&hex::decode(P256_SCALAR).unwrap()).unwrap()
    }

    #[test]
    fn test_compress_matches_library() {
        let verifying = *p256_key().verifying_key();
        let uncompressed = verifying.to_encoded_point(false);
        let ours = compress_p256_point(uncompressed.as_bytes()).unwrap();
        assert_eq!(&ours[..], verifying.to_encoded_point(true).as_bytes());
        assert_eq!(hex::encode(ours), P256_COMPRESSED);
    }

    #[test]
    fn test_compress_uses_trailing_bytes() {
        let verifying = *p256_key().verifying_key();
        let mut prefixed = vec![0xaa; 26];
        prefixed.extend_from_slice(verifying.to_encoded_point(false).as_bytes());
        assert_eq!(hex::encode(compress_p256_point(&prefixed).unwrap()), P256_COMPRESSED);
        assert!(compress_p256_point(&[0x04; 10]).is_err());
    }

    #[test]
    fn test_raw_round_trip() {
        let key = PublicKey::EcdsaP256(*p256_key().verifying_key());
        let raw = key.raw_bytes();
        assert_eq!(raw.len(), 33);
        assert_eq!(PublicKey::from_raw(KeyType::EcdsaP256, &raw).unwrap(), key);
        assert!(PublicKey::from_raw(KeyType::Ed25519, &raw).is_err());
    }

    #[test]
    fn test_attribute_names() {
        assert_eq!(KeyType::Ed25519.attribute_name(), "ed25519PublicKey");
        assert_eq!(
            KeyType::from_attribute_name("ecdsaP256SHA256PublicKey"),
            Some(KeyType::EcdsaP256)
        );
        assert_eq!(KeyType::from_attribute_name("rsaPublicKey"), None);
    }

    #[test]
    fn test_spki_der_parsing() {
        use pkcs8::EncodePublicKey;

        let verifying = *p256_key().verifying_key();
        let der = verifying.to_public_key_der().unwrap();
        let parsed = PublicKey::from_public_key_der(der.as_bytes()).unwrap();
        assert_eq!(parsed.key_type(), KeyType::EcdsaP256);

        let ed = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        let der = ed.to_public_key_der().unwrap();
        let parsed = PublicKey::from_public_key_der(der.as_bytes()).unwrap();
        assert_eq!(parsed, PublicKey::Ed25519(ed));
    }

    #[test]
    fn test_unsupported_spki_reports_algorithm() {
        // SubjectPublicKeyInfo with the X25519 OID (1.3.101.110)
        let mut der = hex::decode("302a300506032b656e032100").unwrap();
        der.extend_from_slice(&[9u8; 32]);
        assert!(matches!(
            PublicKey::from_public_key_der(&der),
            Err(SignError::UnsupportedKeyType { algorithm }) if algorithm == "1.3.101.110"
        ));
    }
}
