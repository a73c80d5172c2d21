use pcl_crypto::{BlockHasher, BlockSigner};
use pcl_types::{Block, BlockField};
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;

/// Which check failed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakReason {
    /// The chain is intact.
    None,
    /// Stored hash differs from the hash recomputed from the block's fields.
    HashMismatch,
    /// `prev_hash` does not match the previous block (or genesis has one).
    LinkMismatch,
    /// The tag over the block hash was not produced by the configured issuer.
    SignatureMismatch,
}

/// Result of detailed verification: the earliest break, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub valid: bool,
    /// Position of the first failing block; `None` when valid.
    pub broken_at_index: Option<u64>,
    pub reason: BreakReason,
}

impl VerificationReport {
    /// The report for an intact (or empty) chain.
    pub const fn intact() -> Self {
        Self {
            valid: true,
            broken_at_index: None,
            reason: BreakReason::None,
        }
    }

    /// A break at `index`.
    pub const fn broken(index: u64, reason: BreakReason) -> Self {
        Self {
            valid: false,
            broken_at_index: Some(index),
            reason,
        }
    }
}

/// Recompute-and-compare verifier over an ordered block sequence.
///
/// For each block at position `i`, in order:
/// 1. link: genesis has no `prev_hash`; otherwise `prev_hash` equals block `i-1`'s hash
/// 2. hash: the stored hash equals the hash recomputed from the stored fields
/// 3. signature: the tag over the stored hash verifies
///
/// A stored column that no longer decodes fails the check it feeds: an
/// undecodable `prev_hash` is a link break, an undecodable signature a
/// signature break, and anything else a hash break.
///
/// Only the first failure is reported. A break also invalidates every later
/// link, so later blocks say nothing about where tampering began.
pub struct ChainVerifier<'a> {
    hasher: &'a BlockHasher,
    signer: &'a dyn BlockSigner,
}

impl<'a> ChainVerifier<'a> {
    pub fn new(hasher: &'a BlockHasher, signer: &'a dyn BlockSigner) -> Self {
        Self { hasher, signer }
    }

    /// Scan `blocks` and report the first failing check.
    pub fn verify(&self, blocks: &[Block]) -> LedgerResult<VerificationReport> {
        let mut prev: Option<&Block> = None;
        for (position, block) in blocks.iter().enumerate() {
            if let Some(reason) = self.check(block, prev)? {
                return Ok(VerificationReport::broken(position as u64, reason));
            }
            prev = Some(block);
        }
        Ok(VerificationReport::intact())
    }

    fn check(&self, block: &Block, prev: Option<&Block>) -> LedgerResult<Option<BreakReason>> {
        let expected_prev = prev.map(|p| p.block_hash);
        if block.is_undecodable(BlockField::PrevHash) || block.prev_hash != expected_prev {
            return Ok(Some(BreakReason::LinkMismatch));
        }

        let hashed_field_undecodable = block
            .undecodable
            .iter()
            .any(|u| !matches!(u.field, BlockField::PrevHash | BlockField::Signature));
        if hashed_field_undecodable || !self.hasher.verify(block)? {
            return Ok(Some(BreakReason::HashMismatch));
        }

        if block.is_undecodable(BlockField::Signature)
            || !self.signer.verify(&block.block_hash, &block.signature)
        {
            return Ok(Some(BreakReason::SignatureMismatch));
        }

        Ok(None)
    }
}
