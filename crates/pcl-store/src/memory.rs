use std::collections::BTreeMap;
use std::sync::RwLock;

use pcl_types::{Block, ChainId};

use crate::error::{StoreError, StoreResult};
use crate::traits::LedgerStore;

/// In-memory, `BTreeMap`-based block store.
///
/// Intended for tests and embedding. Blocks are keyed by index behind a
/// `RwLock`, so reads come back ordered and an append is all-or-nothing.
pub struct InMemoryLedgerStore {
    chain: ChainId,
    blocks: RwLock<BTreeMap<u64, Block>>,
}

impl InMemoryLedgerStore {
    /// Create a new empty store for `chain`.
    pub fn new(chain: ChainId) -> Self {
        Self {
            chain,
            blocks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store pre-loaded with `blocks`, exactly as given.
    ///
    /// No validation is applied: this is how a dump restored from elsewhere,
    /// tampered or not, is handed to a chain manager for verification.
    pub fn with_blocks(chain: ChainId, blocks: impl IntoIterator<Item = Block>) -> Self {
        let map = blocks.into_iter().map(|b| (b.index, b)).collect();
        Self {
            chain,
            blocks: RwLock::new(map),
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn chain(&self) -> ChainId {
        self.chain
    }

    fn append(&self, block: &Block) -> StoreResult<Block> {
        let mut map = self.blocks.write().map_err(|_| StoreError::LockPoisoned)?;
        if map.contains_key(&block.index) {
            return Err(StoreError::DuplicateIndex {
                chain: self.chain,
                index: block.index,
            });
        }
        map.insert(block.index, block.clone());
        Ok(block.clone())
    }

    fn read_all(&self) -> StoreResult<Vec<Block>> {
        let map = self.blocks.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.values().cloned().collect())
    }

    fn read_last(&self) -> StoreResult<Option<Block>> {
        let map = self.blocks.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.values().next_back().cloned())
    }

    fn len(&self) -> StoreResult<u64> {
        let map = self.blocks.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.len() as u64)
    }
}

impl std::fmt::Debug for InMemoryLedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.blocks.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("InMemoryLedgerStore")
            .field("chain", &self.chain)
            .field("block_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use pcl_types::BlockHash;
    use serde_json::json;

    use super::*;

    fn block(index: u64) -> Block {
        Block {
            index,
            timestamp: 1_000 + index as i64,
            payload: json!({"seq": index}).as_object().cloned().unwrap(),
            prev_hash: index
                .checked_sub(1)
                .map(|p| BlockHash::from_hash([p as u8; 32])),
            block_hash: BlockHash::from_hash([index as u8; 32]),
            signature: "00".repeat(32),
            undecodable: Vec::new(),
        }
    }

    #[test]
    fn empty_store() {
        let store = InMemoryLedgerStore::new(ChainId::Fund);
        assert!(store.read_all().unwrap().is_empty());
        assert!(store.read_last().unwrap().is_none());
        assert!(store.is_empty().unwrap());
        assert_eq!(store.len().unwrap(), 0);
        assert_eq!(store.chain(), ChainId::Fund);
    }

    #[test]
    fn append_and_read_in_order() {
        let store = InMemoryLedgerStore::new(ChainId::Project);
        for i in 0..5 {
            let persisted = store.append(&block(i)).unwrap();
            assert_eq!(persisted, block(i));
        }
        let all = store.read_all().unwrap();
        let indices: Vec<u64> = all.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(store.read_last().unwrap().unwrap().index, 4);
        assert_eq!(store.len().unwrap(), 5);
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let store = InMemoryLedgerStore::new(ChainId::Fund);
        store.append(&block(0)).unwrap();
        let err = store.append(&block(0)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateIndex {
                chain: ChainId::Fund,
                index: 0
            }
        ));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn with_blocks_keeps_content_verbatim() {
        let mut tampered = block(1);
        tampered.payload.insert("seq".into(), json!("edited"));
        let store = InMemoryLedgerStore::with_blocks(
            ChainId::Fund,
            vec![tampered.clone(), block(0)],
        );
        let all = store.read_all().unwrap();
        assert_eq!(all[0], block(0));
        assert_eq!(all[1], tampered);
    }

    #[test]
    fn concurrent_reads_are_safe() {
        let store = Arc::new(InMemoryLedgerStore::new(ChainId::Fund));
        for i in 0..3 {
            store.append(&block(i)).unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let all = store.read_all().unwrap();
                    assert_eq!(all.len(), 3);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn debug_shows_count() {
        let store = InMemoryLedgerStore::new(ChainId::Project);
        store.append(&block(0)).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("block_count: 1"));
    }
}
