//! Cryptographic primitives for the PublicChain Ledger.
//!
//! Provides canonical payload encoding, domain-separated BLAKE3 block
//! hashing, block signing (BLAKE3 keyed digest or Ed25519), and the
//! selective-disclosure field fingerprint.
//!
//! All crypto operations wrap established libraries; there is no custom
//! cryptography.

pub mod canonical;
pub mod fingerprint;
pub mod hasher;
pub mod signer;

pub use canonical::{canonical_json, canonical_payload, encode_payload};
pub use fingerprint::{Disclosure, Fingerprint, FingerprintError};
pub use hasher::{BlockHasher, HasherError};
pub use signer::{
    build_signer, BlockSigner, Ed25519Signer, KeyedDigestSigner, SignatureError,
    SignatureScheme, SigningSecret,
};
