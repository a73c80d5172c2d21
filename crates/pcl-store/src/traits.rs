use pcl_types::{Block, ChainId};

use crate::error::StoreResult;

/// Durable, ordered record of the blocks of one chain.
///
/// Implementations must be thread-safe (`Send + Sync`). Appends for a chain
/// are serialized by the chain manager; reads may run concurrently with
/// appends and must only ever observe whole blocks.
pub trait LedgerStore: Send + Sync {
    /// The chain this store holds.
    fn chain(&self) -> ChainId;

    /// Persist a block. Fails on a duplicate index or an unreachable backend.
    fn append(&self, block: &Block) -> StoreResult<Block>;

    /// All blocks in ascending index order.
    fn read_all(&self) -> StoreResult<Vec<Block>>;

    /// The block with the highest index, or `None` for an empty chain.
    fn read_last(&self) -> StoreResult<Option<Block>>;

    /// Number of persisted blocks.
    fn len(&self) -> StoreResult<u64> {
        Ok(self.read_all()?.len() as u64)
    }

    /// Returns `true` if no block has been appended yet.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_last()?.is_none())
    }
}
