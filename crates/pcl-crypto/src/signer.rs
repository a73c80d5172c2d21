use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use pcl_types::BlockHash;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Authenticity tag over a block hash.
///
/// Separates "the chain is self-consistent" from "the chain was produced by
/// the authorized issuer": a forged chain can be internally consistent but
/// cannot carry valid tags without the issuer's secret.
pub trait BlockSigner: Send + Sync {
    /// The tag algorithm.
    fn scheme(&self) -> SignatureScheme;

    /// Produce a hex-encoded tag over `block_hash`.
    fn sign(&self, block_hash: &BlockHash) -> String;

    /// Check a tag. Malformed tags are a mismatch, never an error.
    fn verify(&self, block_hash: &BlockHash, tag: &str) -> bool;
}

/// Which tag algorithm a signer uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    /// BLAKE3 keyed hash with a shared secret (symmetric).
    #[default]
    Keyed,
    /// Ed25519 signature (publicly verifiable).
    Ed25519,
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyed => f.write_str("keyed"),
            Self::Ed25519 => f.write_str("ed25519"),
        }
    }
}

impl FromStr for SignatureScheme {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyed" => Ok(Self::Keyed),
            "ed25519" => Ok(Self::Ed25519),
            other => Err(SignatureError::UnknownScheme(other.to_string())),
        }
    }
}

/// 32-byte server-held secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret([u8; 32]);

impl SigningSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex secret.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(s.trim()).map_err(|e| SignatureError::InvalidSecret(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            SignatureError::InvalidSecret(format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(arr))
    }

    /// Hex encoding, for `keygen` output only.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret(<redacted>)")
    }
}

/// Shared-secret integrity tag: BLAKE3 keyed hash over the block hash.
pub struct KeyedDigestSigner {
    secret: SigningSecret,
}

impl KeyedDigestSigner {
    const DOMAIN: &'static [u8] = b"pcl-signature-v1:";

    pub fn new(secret: SigningSecret) -> Self {
        Self { secret }
    }

    fn tag(&self, block_hash: &BlockHash) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(self.secret.as_bytes());
        hasher.update(Self::DOMAIN);
        hasher.update(block_hash.as_bytes());
        hasher.finalize()
    }
}

impl BlockSigner for KeyedDigestSigner {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Keyed
    }

    fn sign(&self, block_hash: &BlockHash) -> String {
        self.tag(block_hash).to_hex().to_string()
    }

    fn verify(&self, block_hash: &BlockHash, tag: &str) -> bool {
        // blake3::Hash equality is constant-time.
        match blake3::Hash::from_hex(tag) {
            Ok(given) => self.tag(block_hash) == given,
            Err(_) => false,
        }
    }
}

impl fmt::Debug for KeyedDigestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedDigestSigner")
            .field("secret", &self.secret)
            .finish()
    }
}

/// Publicly verifiable Ed25519 signature over the block hash.
///
/// The 32-byte secret is used as the Ed25519 seed.
pub struct Ed25519Signer {
    signing: ed25519_dalek::SigningKey,
}

impl Ed25519Signer {
    pub fn new(secret: &SigningSecret) -> Self {
        Self {
            signing: ed25519_dalek::SigningKey::from_bytes(secret.as_bytes()),
        }
    }

    /// Hex-encoded public key, for publishing alongside the chain.
    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.signing.verifying_key().to_bytes())
    }
}

impl BlockSigner for Ed25519Signer {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }

    fn sign(&self, block_hash: &BlockHash) -> String {
        use ed25519_dalek::Signer;
        hex::encode(self.signing.sign(block_hash.as_bytes()).to_bytes())
    }

    fn verify(&self, block_hash: &BlockHash, tag: &str) -> bool {
        use ed25519_dalek::Verifier;
        let Ok(bytes) = hex::decode(tag) else {
            return false;
        };
        let Ok(arr) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&arr);
        self.signing
            .verifying_key()
            .verify(block_hash.as_bytes(), &signature)
            .is_ok()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Signer({})", self.verifying_key_hex())
    }
}

/// Build the configured signer.
pub fn build_signer(scheme: SignatureScheme, secret: SigningSecret) -> Arc<dyn BlockSigner> {
    match scheme {
        SignatureScheme::Keyed => Arc::new(KeyedDigestSigner::new(secret)),
        SignatureScheme::Ed25519 => Arc::new(Ed25519Signer::new(&secret)),
    }
}

/// Errors from signer construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signing secret: {0}")]
    InvalidSecret(String),
    #[error("unknown signature scheme: {0}")]
    UnknownScheme(String),
}
