use std::sync::{Arc, Mutex, PoisonError};

use pcl_crypto::{encode_payload, BlockHasher, BlockSigner};
use pcl_store::LedgerStore;
use pcl_types::{now_millis, Block, BlockHash, ChainId, Payload};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LedgerResult;
use crate::verification::{ChainVerifier, VerificationReport};

/// Length, head, and validity of one chain at a glance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub chain: ChainId,
    pub length: u64,
    pub head_hash: Option<BlockHash>,
    pub valid: bool,
}

/// Orchestrates append and verification for one chain.
///
/// Appends are serialized per chain: read-last, build-next, and persist run
/// under an exclusive lock, so two concurrent appends can never claim the
/// same index. Reads and verification take no lock and see a consistent
/// snapshot that may lag an in-flight append by one block.
pub struct ChainManager {
    chain: ChainId,
    store: Arc<dyn LedgerStore>,
    signer: Arc<dyn BlockSigner>,
    hasher: BlockHasher,
    append_lock: Mutex<()>,
}

impl ChainManager {
    pub fn new(store: Arc<dyn LedgerStore>, signer: Arc<dyn BlockSigner>) -> Self {
        Self {
            chain: store.chain(),
            store,
            signer,
            hasher: BlockHasher::BLOCK,
            append_lock: Mutex::new(()),
        }
    }

    /// The chain this manager owns.
    pub fn chain(&self) -> ChainId {
        self.chain
    }

    /// Append `payload` as the next block.
    ///
    /// Nothing is persisted unless every step succeeds. Storage and encoding
    /// failures are returned as-is; retrying is the caller's decision.
    pub fn add_block(&self, payload: Payload) -> LedgerResult<Block> {
        // The lock guards no data, so a poisoned lock is still safe to take.
        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let last = self.store.read_last()?;
        let (index, prev_hash, floor) = match &last {
            Some(b) => (b.index + 1, Some(b.block_hash), b.timestamp),
            None => (0, None, i64::MIN),
        };
        // Never stamp a block earlier than its predecessor.
        let timestamp = now_millis().max(floor);

        let block_hash = self
            .hasher
            .hash(index, timestamp, &payload, prev_hash.as_ref())?;
        let signature = self.signer.sign(&block_hash);

        let block = Block {
            index,
            timestamp,
            payload,
            prev_hash,
            block_hash,
            signature,
            undecodable: Vec::new(),
        };
        let persisted = self.store.append(&block)?;

        info!(
            chain = %self.chain,
            index = persisted.index,
            hash = %persisted.block_hash.short_hex(),
            "appended block"
        );
        Ok(persisted)
    }

    /// Append any serializable record that encodes to a field→value mapping.
    pub fn add_record<T: Serialize + ?Sized>(&self, record: &T) -> LedgerResult<Block> {
        let payload = encode_payload(record)?;
        self.add_block(payload)
    }

    /// Every block in ascending index order, verbatim.
    pub fn get_chain(&self) -> LedgerResult<Vec<Block>> {
        let blocks = self.store.read_all()?;
        debug!(chain = %self.chain, count = blocks.len(), "read chain");
        Ok(blocks)
    }

    /// The most recent block, if any.
    pub fn head(&self) -> LedgerResult<Option<Block>> {
        Ok(self.store.read_last()?)
    }

    /// Number of blocks in the chain.
    pub fn len(&self) -> LedgerResult<u64> {
        Ok(self.store.len()?)
    }

    /// Returns `true` before the genesis block is appended.
    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.store.is_empty()?)
    }

    /// `true` iff every block passes its link, hash, and signature checks.
    pub fn verify_chain(&self) -> LedgerResult<bool> {
        Ok(self.verify_chain_detailed()?.valid)
    }

    /// The first block at which any check fails, and which check.
    pub fn verify_chain_detailed(&self) -> LedgerResult<VerificationReport> {
        let blocks = self.store.read_all()?;
        self.verify_blocks(&blocks)
    }

    /// Length, head, and validity, all taken from the same snapshot.
    pub fn summary(&self) -> LedgerResult<ChainSummary> {
        let blocks = self.store.read_all()?;
        let report = self.verify_blocks(&blocks)?;
        Ok(ChainSummary {
            chain: self.chain,
            length: blocks.len() as u64,
            head_hash: blocks.last().map(|b| b.block_hash),
            valid: report.valid,
        })
    }

    fn verify_blocks(&self, blocks: &[Block]) -> LedgerResult<VerificationReport> {
        let report = ChainVerifier::new(&self.hasher, self.signer.as_ref()).verify(blocks)?;
        if !report.valid {
            warn!(
                chain = %self.chain,
                index = ?report.broken_at_index,
                reason = ?report.reason,
                "chain verification failed"
            );
        }
        Ok(report)
    }
}

impl std::fmt::Debug for ChainManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainManager")
            .field("chain", &self.chain)
            .field("scheme", &self.signer.scheme())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    use pcl_crypto::{KeyedDigestSigner, SigningSecret};
    use pcl_store::{InMemoryLedgerStore, StoreError, StoreResult};
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::error::LedgerError;
    use crate::verification::BreakReason;

    fn signer() -> Arc<dyn BlockSigner> {
        Arc::new(KeyedDigestSigner::new(SigningSecret::from_bytes([11; 32])))
    }

    fn manager(chain: ChainId) -> ChainManager {
        ChainManager::new(Arc::new(InMemoryLedgerStore::new(chain)), signer())
    }

    fn fund_release(title: &str, amount: u64) -> Payload {
        json!({
            "title": title,
            "department": "Public Works",
            "amount": amount,
            "urgency": "high",
            "reason": "monsoon damage"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    /// Rebuild a manager over a copy of `blocks`, as if the table had been
    /// edited out-of-band.
    fn reload(blocks: Vec<Block>) -> ChainManager {
        ChainManager::new(
            Arc::new(InMemoryLedgerStore::with_blocks(ChainId::Fund, blocks)),
            signer(),
        )
    }

    /// Store whose writes fail as if the database were unreachable.
    struct UnreachableStore {
        inner: InMemoryLedgerStore,
        down: AtomicBool,
    }

    impl LedgerStore for UnreachableStore {
        fn chain(&self) -> ChainId {
            self.inner.chain()
        }
        fn append(&self, block: &Block) -> StoreResult<Block> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            self.inner.append(block)
        }
        fn read_all(&self) -> StoreResult<Vec<Block>> {
            self.inner.read_all()
        }
        fn read_last(&self) -> StoreResult<Option<Block>> {
            self.inner.read_last()
        }
    }

    /// Store that counts how the chain is read.
    struct CountingStore {
        inner: InMemoryLedgerStore,
        read_all: AtomicUsize,
        other_reads: AtomicUsize,
    }

    impl LedgerStore for CountingStore {
        fn chain(&self) -> ChainId {
            self.inner.chain()
        }
        fn append(&self, block: &Block) -> StoreResult<Block> {
            self.inner.append(block)
        }
        fn read_all(&self) -> StoreResult<Vec<Block>> {
            self.read_all.fetch_add(1, Ordering::SeqCst);
            self.inner.read_all()
        }
        fn read_last(&self) -> StoreResult<Option<Block>> {
            self.other_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_last()
        }
        fn len(&self) -> StoreResult<u64> {
            self.other_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.len()
        }
    }

    #[test]
    fn genesis_block_has_no_predecessor() {
        let m = manager(ChainId::Fund);
        let genesis = m.add_block(fund_release("Relief", 500)).unwrap();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.prev_hash, None);
        assert_eq!(m.verify_chain_detailed().unwrap(), VerificationReport::intact());
    }

    #[test]
    fn appends_link_to_previous_block() {
        let m = manager(ChainId::Fund);
        let a = m.add_block(fund_release("A", 1)).unwrap();
        let b = m.add_block(fund_release("B", 2)).unwrap();
        let c = m.add_block(fund_release("C", 3)).unwrap();
        assert_eq!(b.prev_hash, Some(a.block_hash));
        assert_eq!(c.prev_hash, Some(b.block_hash));
        assert!(c.timestamp >= b.timestamp && b.timestamp >= a.timestamp);
    }

    #[test]
    fn get_chain_returns_contiguous_indices() {
        let m = manager(ChainId::Project);
        for i in 0..10 {
            m.add_block(fund_release("P", i)).unwrap();
        }
        let chain = m.get_chain().unwrap();
        let indices: Vec<u64> = chain.iter().map(|b| b.index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
        assert_eq!(m.len().unwrap(), 10);
        assert_eq!(m.head().unwrap().unwrap().index, 9);
    }

    #[test]
    fn empty_chain_verifies() {
        let m = manager(ChainId::Fund);
        assert!(m.is_empty().unwrap());
        assert!(m.verify_chain().unwrap());
        assert_eq!(m.verify_chain_detailed().unwrap().broken_at_index, None);
    }

    #[test]
    fn verify_is_idempotent() {
        let m = manager(ChainId::Fund);
        m.add_block(fund_release("A", 1)).unwrap();
        let first = m.verify_chain_detailed().unwrap();
        let second = m.verify_chain_detailed().unwrap();
        assert_eq!(first, second);
        assert_eq!(m.verify_chain().unwrap(), m.verify_chain().unwrap());
    }

    #[test]
    fn stored_blocks_reproduce_their_hash() {
        let m = manager(ChainId::Fund);
        for i in 0..4 {
            m.add_block(fund_release("R", i)).unwrap();
        }
        for block in m.get_chain().unwrap() {
            assert_eq!(
                BlockHasher::BLOCK.hash_block(&block).unwrap(),
                block.block_hash
            );
        }
    }

    #[test]
    fn tampered_payload_is_detected_at_its_index() {
        let m = manager(ChainId::Fund);
        for i in 0..3 {
            m.add_block(fund_release("Release", 1_000 * (i + 1))).unwrap();
        }
        let mut blocks = m.get_chain().unwrap();
        blocks[1].payload.insert("amount".into(), json!(9_999_999));

        let tampered = reload(blocks);
        assert!(!tampered.verify_chain().unwrap());
        assert_eq!(
            tampered.verify_chain_detailed().unwrap(),
            VerificationReport::broken(1, BreakReason::HashMismatch)
        );
    }

    #[test]
    fn rehashed_block_breaks_the_next_link_but_first_break_is_reported() {
        let m = manager(ChainId::Fund);
        for i in 0..3 {
            m.add_block(fund_release("Release", i)).unwrap();
        }
        let mut blocks = m.get_chain().unwrap();

        // Rewrite block 1 and recompute its hash, without re-signing.
        blocks[1].payload.insert("amount".into(), json!(42));
        blocks[1].block_hash = BlockHasher::BLOCK.hash_block(&blocks[1]).unwrap();

        // Block 2 is still self-consistent but no longer links to block 1.
        assert!(BlockHasher::BLOCK.verify(&blocks[2]).unwrap());
        assert_ne!(blocks[2].prev_hash, Some(blocks[1].block_hash));

        let report = reload(blocks).verify_chain_detailed().unwrap();
        assert_eq!(report, VerificationReport::broken(1, BreakReason::SignatureMismatch));
    }

    #[test]
    fn wholesale_forgery_is_a_signature_mismatch() {
        let forger = ChainManager::new(
            Arc::new(InMemoryLedgerStore::new(ChainId::Fund)),
            Arc::new(KeyedDigestSigner::new(SigningSecret::from_bytes([99; 32]))),
        );
        for i in 0..3 {
            forger.add_block(fund_release("Forged", i)).unwrap();
        }
        assert!(forger.verify_chain().unwrap());

        let report = reload(forger.get_chain().unwrap())
            .verify_chain_detailed()
            .unwrap();
        assert_eq!(report, VerificationReport::broken(0, BreakReason::SignatureMismatch));
    }

    #[test]
    fn storage_failure_aborts_append_without_partial_block() {
        let store = Arc::new(UnreachableStore {
            inner: InMemoryLedgerStore::new(ChainId::Fund),
            down: AtomicBool::new(false),
        });
        let m = ChainManager::new(store.clone(), signer());
        m.add_block(fund_release("A", 1)).unwrap();

        store.down.store(true, Ordering::SeqCst);
        let err = m.add_block(fund_release("B", 2)).unwrap_err();
        assert!(matches!(err, LedgerError::Storage(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert_eq!(m.len().unwrap(), 1);
        assert!(m.verify_chain().unwrap());

        store.down.store(false, Ordering::SeqCst);
        let b = m.add_block(fund_release("B", 2)).unwrap();
        assert_eq!(b.index, 1);
    }

    #[test]
    fn unencodable_record_is_an_encoding_error() {
        let m = manager(ChainId::Fund);
        let mut record = HashMap::new();
        record.insert((1, 2), "tuple keys have no JSON form");
        let err = m.add_record(&record).unwrap_err();
        assert!(matches!(err, LedgerError::Encoding(_)));
        assert!(!err.is_retryable());
        assert!(m.is_empty().unwrap());

        let err = m.add_record(&"just a string").unwrap_err();
        assert!(matches!(err, LedgerError::Encoding(_)));
    }

    #[test]
    fn concurrent_appends_never_fork() {
        const WRITERS: u64 = 16;
        let m = Arc::new(manager(ChainId::Project));

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let m = Arc::clone(&m);
                thread::spawn(move || m.add_block(fund_release("Concurrent", i)).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let chain = m.get_chain().unwrap();
        let indices: Vec<u64> = chain.iter().map(|b| b.index).collect();
        assert_eq!(indices, (0..WRITERS).collect::<Vec<_>>());
        for pair in chain.windows(2) {
            assert_eq!(pair[1].prev_hash, Some(pair[0].block_hash));
        }
        assert!(m.verify_chain().unwrap());
    }

    #[test]
    fn summary_reads_a_single_snapshot() {
        let store = Arc::new(CountingStore {
            inner: InMemoryLedgerStore::new(ChainId::Fund),
            read_all: AtomicUsize::new(0),
            other_reads: AtomicUsize::new(0),
        });
        let m = ChainManager::new(store.clone(), signer());
        m.add_block(fund_release("A", 1)).unwrap();
        let head = m.add_block(fund_release("B", 2)).unwrap();
        store.read_all.store(0, Ordering::SeqCst);
        store.other_reads.store(0, Ordering::SeqCst);

        let summary = m.summary().unwrap();
        assert_eq!(
            summary,
            ChainSummary {
                chain: ChainId::Fund,
                length: 2,
                head_hash: Some(head.block_hash),
                valid: true,
            }
        );
        assert_eq!(store.read_all.load(Ordering::SeqCst), 1);
        assert_eq!(store.other_reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn summary_of_tampered_chain_is_invalid() {
        let m = manager(ChainId::Fund);
        for i in 0..2 {
            m.add_block(fund_release("R", i)).unwrap();
        }
        let mut blocks = m.get_chain().unwrap();
        blocks[0].timestamp += 1;
        let summary = reload(blocks).summary().unwrap();
        assert_eq!(summary.length, 2);
        assert!(!summary.valid);
    }

    #[test]
    fn debug_names_chain_and_scheme() {
        let debug = format!("{:?}", manager(ChainId::Fund));
        assert!(debug.contains("Fund"));
        assert!(debug.contains("Keyed"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_append_sequence_verifies(
            amounts in proptest::collection::vec(any::<u32>(), 0..12),
        ) {
            let m = manager(ChainId::Fund);
            for amount in &amounts {
                m.add_block(fund_release("Prop", u64::from(*amount))).unwrap();
            }
            prop_assert!(m.verify_chain().unwrap());
            prop_assert_eq!(m.len().unwrap(), amounts.len() as u64);
        }
    }
}
