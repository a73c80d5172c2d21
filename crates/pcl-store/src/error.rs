use pcl_types::ChainId;

/// Errors from ledger store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A block with this index is already persisted.
    #[error("duplicate block index {index} in {chain} chain")]
    DuplicateIndex { chain: ChainId, index: u64 },

    /// Any other constraint the backend enforces.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Backend is busy, locked past its timeout, or unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Other backend failure.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
