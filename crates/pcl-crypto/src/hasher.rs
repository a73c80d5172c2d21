use pcl_types::{Block, BlockHash, Payload};

use crate::canonical::canonical_payload;

/// Domain-separated BLAKE3 block hasher.
///
/// The digest covers `(index, timestamp, canonical(payload), prev_hash)`.
/// Appending and re-verifying must go through the same hasher so that a
/// stored block always reproduces its own hash.
pub struct BlockHasher {
    domain: &'static str,
}

impl BlockHasher {
    /// Hasher for ledger blocks.
    pub const BLOCK: Self = Self {
        domain: "pcl-block-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash a block's canonical fields.
    pub fn hash(
        &self,
        index: u64,
        timestamp: i64,
        payload: &Payload,
        prev_hash: Option<&BlockHash>,
    ) -> Result<BlockHash, HasherError> {
        let encoded = canonical_payload(payload)?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(&index.to_le_bytes());
        hasher.update(&timestamp.to_le_bytes());
        match prev_hash {
            Some(prev) => {
                hasher.update(&[1]);
                hasher.update(prev.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.update(&(encoded.len() as u64).to_le_bytes());
        hasher.update(&encoded);
        Ok(BlockHash::from_hash(*hasher.finalize().as_bytes()))
    }

    /// Recompute a stored block's hash from its own fields.
    pub fn hash_block(&self, block: &Block) -> Result<BlockHash, HasherError> {
        self.hash(
            block.index,
            block.timestamp,
            &block.payload,
            block.prev_hash.as_ref(),
        )
    }

    /// Returns `true` if the block's stored hash matches its fields.
    pub fn verify(&self, block: &Block) -> Result<bool, HasherError> {
        Ok(self.hash_block(block)? == block.block_hash)
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("payload cannot be encoded: {0}")]
    Encoding(String),
}
