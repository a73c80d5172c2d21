//! Foundation types for the PublicChain Ledger (PCL).
//!
//! PCL keeps government fund releases and project records in two independent,
//! append-only, hash-linked chains. Every other PCL crate depends on
//! `pcl-types`.
//!
//! # Key Types
//!
//! - [`ChainId`]: which chain a block belongs to (`Fund` or `Project`)
//! - [`BlockHash`]: 32-byte block digest, hex-encoded on the wire
//! - [`Block`]: one immutable ledger entry with linkage and integrity metadata
//! - [`Payload`]: the opaque field→value record a block carries

pub mod block;
pub mod chain;
pub mod error;
pub mod hash;
pub mod temporal;

pub use block::{payload_from_value, Block, BlockField, Payload, Undecodable};
pub use chain::ChainId;
pub use error::TypeError;
pub use hash::BlockHash;
pub use temporal::now_millis;
