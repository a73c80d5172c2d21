//! HTTP server for the PublicChain Ledger.
//!
//! Exposes the fund and project chains over a JSON API: append, read,
//! verify, and a selective-disclosure fingerprint service. Ledger calls
//! run on the blocking pool so a slow or locked database never stalls the
//! async workers.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{ServerConfig, SigningConfig, SECRET_ENV};
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, SignerInfo};
pub use router::build_router;
pub use server::PclServer;
