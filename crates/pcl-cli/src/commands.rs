use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use pcl_crypto::{build_signer, Ed25519Signer, Fingerprint, SignatureScheme, SigningSecret};
use pcl_ledger::{BreakReason, ChainService};
use pcl_server::{PclServer, ServerConfig, SECRET_ENV};
use pcl_types::{payload_from_value, Block, Payload};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Add(args) => cmd_add(args, &format),
        Command::Chain(args) => cmd_chain(args, &format),
        Command::Verify(args) => cmd_verify(args, &format),
        Command::Keygen(args) => cmd_keygen(args),
        Command::Fingerprint(args) => cmd_fingerprint(args, &format),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ServerConfig::default().apply_env(),
    };
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(PclServer::new(config).serve())?;
    Ok(())
}

fn cmd_add(args: AddArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let payload = read_record(&args.record)?;
    let service = open_service(&args.ledger, true)?;
    let block = service.add_block(args.chain, payload)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&block)?),
        OutputFormat::Text => {
            println!(
                "{} Added {} block {}",
                "✓".green().bold(),
                args.chain.to_string().cyan(),
                format!("#{}", block.index).yellow()
            );
            print_block_detail(&block);
        }
    }
    Ok(())
}

fn cmd_chain(args: ChainArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let service = open_service(&args.ledger, false)?;
    let blocks = service.get_chain(args.chain)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&blocks)?),
        OutputFormat::Text => {
            if blocks.is_empty() {
                println!("The {} chain is empty.", args.chain);
                return Ok(());
            }
            for block in &blocks {
                println!(
                    "{}  {}  {}",
                    format!("#{}", block.index).yellow().bold(),
                    block.block_hash.short_hex().cyan(),
                    format_timestamp(block.timestamp).dimmed()
                );
                println!("  {}", serde_json::Value::Object(block.payload.clone()));
            }
            println!("{} blocks", blocks.len().to_string().bold());
        }
    }
    Ok(())
}

fn cmd_verify(args: VerifyArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let service = open_service(&args.ledger, true)?;
    let report = service.verify_chain_detailed(args.chain)?;
    match format {
        OutputFormat::Json if args.detailed => {
            println!("{}", serde_json::to_string_pretty(&report)?)
        }
        OutputFormat::Json => println!("{}", serde_json::json!({"valid": report.valid})),
        OutputFormat::Text if report.valid => {
            println!(
                "{} {} chain integrity verified",
                "✓".green().bold(),
                args.chain
            );
        }
        OutputFormat::Text => {
            println!("{} {} chain is broken", "✗".red().bold(), args.chain);
            if args.detailed {
                if let Some(index) = report.broken_at_index {
                    println!("  At block: {}", format!("#{index}").yellow());
                }
                println!("  Reason: {}", describe(report.reason).red());
            }
        }
    }
    if !report.valid {
        bail!("{} chain failed verification", args.chain);
    }
    Ok(())
}

fn cmd_keygen(args: KeygenArgs) -> anyhow::Result<()> {
    let secret = SigningSecret::generate();
    println!("{}", secret.to_hex());
    if args.scheme == SignatureScheme::Ed25519 {
        let public = Ed25519Signer::new(&secret).verifying_key_hex();
        eprintln!("public key: {}", public.cyan());
    }
    eprintln!("Store it in {} or pass it with --secret.", SECRET_ENV.bold());
    Ok(())
}

fn cmd_fingerprint(args: FingerprintArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let record = read_record(&args.record)?;
    let disclosure = Fingerprint::generate(&record, args.fields.as_slice())?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&disclosure)?),
        OutputFormat::Text => {
            println!("Proof: {}", serde_json::Value::Object(disclosure.proof));
            println!("Hash:  {}", disclosure.hash.cyan());
        }
    }
    Ok(())
}

/// Open both chains in `args.db`.
///
/// Reads work without a secret; a throwaway key is used since nothing is
/// signed or checked.
fn open_service(args: &LedgerArgs, require_secret: bool) -> anyhow::Result<ChainService> {
    let secret = match resolve_secret(args.secret.clone()) {
        Some(hex) => SigningSecret::from_hex(&hex).context("invalid signing secret")?,
        None if require_secret => {
            bail!("no signing secret: pass --secret or set {SECRET_ENV}")
        }
        None => SigningSecret::generate(),
    };
    let signer = build_signer(args.scheme, secret);
    let timeout = std::time::Duration::from_millis(args.busy_timeout_ms);
    ChainService::sqlite(&args.db, timeout, signer)
        .with_context(|| format!("opening ledger database {}", args.db.display()))
}

fn resolve_secret(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(SECRET_ENV).ok())
        .filter(|s| !s.trim().is_empty())
}

/// Parse a JSON object given inline or as `@path`.
fn read_record(input: &str) -> anyhow::Result<Payload> {
    let text = match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("reading record from {path}"))?,
        None => input.to_string(),
    };
    let value: serde_json::Value = serde_json::from_str(&text).context("record is not JSON")?;
    Ok(payload_from_value(value)?)
}

fn print_block_detail(block: &Block) {
    println!("  Hash:      {}", block.block_hash.to_hex().cyan());
    match &block.prev_hash {
        Some(prev) => println!("  Previous:  {}", prev.to_hex()),
        None => println!("  Previous:  {}", "(genesis)".dimmed()),
    }
    println!("  Timestamp: {}", format_timestamp(block.timestamp));
    println!("  Signature: {}", block.signature.dimmed());
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn describe(reason: BreakReason) -> &'static str {
    match reason {
        BreakReason::None => "none",
        BreakReason::HashMismatch => "block contents do not match the stored hash",
        BreakReason::LinkMismatch => "previous-hash link does not match the prior block",
        BreakReason::SignatureMismatch => "signature does not verify",
    }
}
