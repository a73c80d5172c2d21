//! Ordered block storage for the PublicChain Ledger.
//!
//! A store is a dumb, ordered record keeper for one chain: it persists
//! blocks and hands them back in index order. It never hashes, signs, or
//! validates; those belong to the chain manager in `pcl-ledger`.
//!
//! # Storage Backends
//!
//! All backends implement the [`LedgerStore`] trait:
//!
//! - [`InMemoryLedgerStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`SqliteLedgerStore`] -- one relational table per chain
//!
//! # Design Rules
//!
//! 1. Blocks are ordered by `index` ascending; reads never reorder or filter.
//! 2. An append is a single atomic write: a reader sees the whole block or none of it.
//! 3. A duplicate index is a constraint violation, never an overwrite.
//! 4. Every backend call is bounded: a busy or unreachable backend surfaces
//!    as [`StoreError::Unavailable`] instead of blocking the caller.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryLedgerStore;
pub use sqlite::{SqliteLedgerStore, DEFAULT_BUSY_TIMEOUT};
pub use traits::LedgerStore;
