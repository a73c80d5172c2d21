use pcl_crypto::HasherError;
use pcl_store::StoreError;
use pcl_types::ChainId;

/// Errors produced by ledger operations.
///
/// A broken chain is not an error: it is reported as a
/// [`VerificationReport`](crate::VerificationReport).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The payload cannot be canonicalized or hashed. Not retryable.
    #[error("encoding error: {0}")]
    Encoding(#[from] HasherError),

    /// The store is unreachable or rejected the write. The whole append may be retried.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A store was wired to the wrong chain.
    #[error("store holds the {found} chain, expected {expected}")]
    ChainMismatch { expected: ChainId, found: ChainId },
}

impl LedgerError {
    /// Returns `true` if retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage(StoreError::Unavailable(_) | StoreError::DuplicateIndex { .. })
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
