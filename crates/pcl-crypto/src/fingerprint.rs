use pcl_types::Payload;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::canonical_payload;
use crate::hasher::HasherError;

/// A disclosed subset of a record plus its SHA-256 fingerprint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Disclosure {
    /// Only the selected fields of the source record.
    pub proof: Payload,
    /// Hex SHA-256 over the canonical JSON of `proof`.
    pub hash: String,
}

/// Selective-disclosure fingerprinting.
///
/// Independent of the ledger's hash chain: a holder reveals some fields of a
/// record and a verifier later checks the revealed fields were not altered.
/// This is an equality fingerprint, not a zero-knowledge proof.
pub struct Fingerprint;

impl Fingerprint {
    /// Disclose `selected` fields of `record` and fingerprint them.
    ///
    /// Selected fields absent from the record are skipped.
    pub fn generate<S: AsRef<str>>(
        record: &Payload,
        selected: &[S],
    ) -> Result<Disclosure, FingerprintError> {
        if selected.is_empty() {
            return Err(FingerprintError::NoFieldsSelected);
        }

        let mut proof = Payload::new();
        for field in selected {
            let field = field.as_ref();
            if let Some(value) = record.get(field) {
                proof.insert(field.to_string(), value.clone());
            }
        }
        if proof.is_empty() {
            return Err(FingerprintError::NoMatchingFields);
        }

        let hash = Self::digest(&proof)?;
        Ok(Disclosure { proof, hash })
    }

    /// Hex SHA-256 over the canonical JSON of `fields`.
    pub fn digest(fields: &Payload) -> Result<String, FingerprintError> {
        let encoded = canonical_payload(fields)?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }

    /// Returns `true` if `fields` still produce `hash`.
    pub fn matches(fields: &Payload, hash: &str) -> bool {
        match Self::digest(fields) {
            Ok(computed) => computed.eq_ignore_ascii_case(hash.trim()),
            Err(_) => false,
        }
    }
}

/// Errors from fingerprint generation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("at least one field must be selected")]
    NoFieldsSelected,
    #[error("no valid fields selected for proof")]
    NoMatchingFields,
    #[error(transparent)]
    Encoding(#[from] HasherError),
}
