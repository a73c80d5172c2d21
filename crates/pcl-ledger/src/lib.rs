//! Append-only, hash-linked chains for the PublicChain Ledger (PCL).
//!
//! This crate is the heart of PCL. It provides:
//! - [`ChainManager`]: serialized append (read-last, build-next, persist) and
//!   recompute-and-compare verification for one chain
//! - [`VerificationReport`] / [`BreakReason`]: where and why a chain breaks
//! - [`ChainService`]: the facade the transport layer calls, routing each
//!   request to the fund or project chain

pub mod error;
pub mod manager;
pub mod service;
pub mod verification;

pub use error::{LedgerError, LedgerResult};
pub use manager::{ChainManager, ChainSummary};
pub use service::ChainService;
pub use verification::{BreakReason, ChainVerifier, VerificationReport};
