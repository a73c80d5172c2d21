use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pcl_crypto::BlockSigner;
use pcl_store::{InMemoryLedgerStore, LedgerStore, SqliteLedgerStore};
use pcl_types::{Block, ChainId, Payload};

use crate::error::{LedgerError, LedgerResult};
use crate::manager::{ChainManager, ChainSummary};
use crate::verification::VerificationReport;

/// Facade over the fund and project chains.
///
/// Stateless beyond routing: every call is delegated to the chain's
/// [`ChainManager`] and its result returned unchanged.
#[derive(Debug)]
pub struct ChainService {
    fund: ChainManager,
    project: ChainManager,
}

impl ChainService {
    /// Wire two managers. Each must own the chain it is passed for.
    pub fn new(fund: ChainManager, project: ChainManager) -> LedgerResult<Self> {
        for (expected, manager) in [(ChainId::Fund, &fund), (ChainId::Project, &project)] {
            if manager.chain() != expected {
                return Err(LedgerError::ChainMismatch {
                    expected,
                    found: manager.chain(),
                });
            }
        }
        Ok(Self { fund, project })
    }

    /// Both chains held in memory.
    pub fn in_memory(signer: Arc<dyn BlockSigner>) -> Self {
        Self {
            fund: ChainManager::new(
                Arc::new(InMemoryLedgerStore::new(ChainId::Fund)),
                Arc::clone(&signer),
            ),
            project: ChainManager::new(
                Arc::new(InMemoryLedgerStore::new(ChainId::Project)),
                signer,
            ),
        }
    }

    /// Both chains in one SQLite file, each in its own table.
    pub fn sqlite(
        path: &Path,
        busy_timeout: Duration,
        signer: Arc<dyn BlockSigner>,
    ) -> LedgerResult<Self> {
        let fund = SqliteLedgerStore::open(path, ChainId::Fund, busy_timeout)?;
        let project = SqliteLedgerStore::with_connection(fund.connection(), ChainId::Project)?;
        let fund: Arc<dyn LedgerStore> = Arc::new(fund);
        let project: Arc<dyn LedgerStore> = Arc::new(project);
        Ok(Self {
            fund: ChainManager::new(fund, Arc::clone(&signer)),
            project: ChainManager::new(project, signer),
        })
    }

    /// The manager for `chain`.
    pub fn manager(&self, chain: ChainId) -> &ChainManager {
        match chain {
            ChainId::Fund => &self.fund,
            ChainId::Project => &self.project,
        }
    }

    pub fn add_block(&self, chain: ChainId, payload: Payload) -> LedgerResult<Block> {
        self.manager(chain).add_block(payload)
    }

    pub fn get_chain(&self, chain: ChainId) -> LedgerResult<Vec<Block>> {
        self.manager(chain).get_chain()
    }

    pub fn verify_chain(&self, chain: ChainId) -> LedgerResult<bool> {
        self.manager(chain).verify_chain()
    }

    pub fn verify_chain_detailed(&self, chain: ChainId) -> LedgerResult<VerificationReport> {
        self.manager(chain).verify_chain_detailed()
    }

    pub fn summary(&self, chain: ChainId) -> LedgerResult<ChainSummary> {
        self.manager(chain).summary()
    }
}
