use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pcl_crypto::SignatureScheme;
use pcl_types::ChainId;

#[derive(Parser)]
#[command(
    name = "pcl",
    about = "PublicChain Ledger: tamper-evident fund and project records",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Append a record to a chain
    Add(AddArgs),
    /// List the blocks of a chain
    Chain(ChainArgs),
    /// Verify chain integrity
    Verify(VerifyArgs),
    /// Generate a fresh signing secret
    Keygen(KeygenArgs),
    /// Disclose selected fields of a record with a fingerprint
    Fingerprint(FingerprintArgs),
}

/// Where the chains live and how blocks are signed.
#[derive(Args, Clone)]
pub struct LedgerArgs {
    /// SQLite database holding both chains
    #[arg(long, default_value = "data/publicchain.db")]
    pub db: PathBuf,
    /// Hex signing secret (falls back to PCL_SIGNING_SECRET)
    #[arg(long)]
    pub secret: Option<String>,
    #[arg(long, default_value = "keyed")]
    pub scheme: SignatureScheme,
    /// Busy timeout for a locked database, in milliseconds
    #[arg(long, default_value = "5000")]
    pub busy_timeout_ms: u64,
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct AddArgs {
    pub chain: ChainId,
    /// JSON object, or @path to read it from a file
    pub record: String,
    #[command(flatten)]
    pub ledger: LedgerArgs,
}

#[derive(Args)]
pub struct ChainArgs {
    pub chain: ChainId,
    #[command(flatten)]
    pub ledger: LedgerArgs,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub chain: ChainId,
    /// Report where and why the chain breaks
    #[arg(long)]
    pub detailed: bool,
    #[command(flatten)]
    pub ledger: LedgerArgs,
}

#[derive(Args)]
pub struct KeygenArgs {
    #[arg(long, default_value = "keyed")]
    pub scheme: SignatureScheme,
}

#[derive(Args)]
pub struct FingerprintArgs {
    /// JSON object, or @path to read it from a file
    pub record: String,
    /// Fields to disclose
    #[arg(long, value_delimiter = ',', required = true)]
    pub fields: Vec<String>,
}
