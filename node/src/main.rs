// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Airdrop Node
//!
//! Entry point for the `airdrop-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and dispatches to a subcommand:
//!
//! - `serve`: HTTP/WS API over an in-memory distributor ledger
//! - `generate`: allocation file in, dump file out
//! - `proof`: one address's allocation and proof from a dump
//! - `verify`: structural (and optionally full) check of a dump
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{broadcast, RwLock};

use airdrop_contracts::MemoryLedger;
use airdrop_protocol::merkle::{AllocationInput, Dump, MerkleTree};
use airdrop_protocol::types::Address;
use airdrop_protocol::{publish_root, Ledger, RootUpdate};

use cli::{AirdropNodeCli, Commands};
use metrics::NodeMetrics;

/// Broadcast channel capacity for live event streaming.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AirdropNodeCli::parse();
    logging::init_logging(&cli.log.log_level, cli.log.log_format.into())?;

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Generate(args) => generate(args),
        Commands::Proof(args) => proof(args),
        Commands::Verify(args) => verify(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the API and metrics servers.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    let operator = Address::parse(&args.operator)
        .with_context(|| format!("invalid operator address: {}", args.operator))?;
    let ledger_timeout = Duration::from_secs(args.ledger_timeout_secs);

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        %operator,
        ledger_timeout_secs = args.ledger_timeout_secs,
        "starting airdrop-node"
    );

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Ledger ---
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new(operator));
    tracing::warn!("serving against an in-memory ledger; state is lost on exit");

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        chain_id: api::DEFAULT_CHAIN_ID,
        distribution: Arc::new(RwLock::new(None)),
        ledger,
        ledger_timeout,
        dump_path: args.dump.clone(),
        event_tx,
        metrics: Arc::clone(&node_metrics),
    };

    // --- Stored distribution ---
    if let Some(path) = args.dump.as_deref().filter(|p| p.exists()) {
        let tree = load_tree(path)?;
        tracing::info!(
            path = %path.display(),
            root = %tree.root_hex(),
            leaves = tree.len(),
            "loaded distribution"
        );
        let root = tree.root();
        app_state.set_distribution(Arc::new(tree)).await;

        if args.publish_on_start {
            let update = api::with_ledger_timeout(
                &app_state,
                publish_root(app_state.ledger.as_ref(), root),
            )
            .await
            .context("failed to publish stored root")?;
            match update {
                RootUpdate::Unchanged { .. } => tracing::info!("stored root already published"),
                RootUpdate::Updated { tx_hash, .. } => {
                    node_metrics.root_updates_total.inc();
                    tracing::info!(%tx_hash, "stored root published");
                }
            }
        }
    } else if args.publish_on_start {
        tracing::warn!("--publish-on-start given but no stored distribution to publish");
    }

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("airdrop-node stopped");
    Ok(())
}

/// Allocation files come either bare or wrapped like the HTTP body.
#[derive(Deserialize)]
#[serde(untagged)]
enum AllocationFile {
    List(Vec<AllocationInput>),
    Wrapped { allocations: Vec<AllocationInput> },
}

impl AllocationFile {
    fn into_inputs(self) -> Vec<AllocationInput> {
        match self {
            AllocationFile::List(inputs) | AllocationFile::Wrapped { allocations: inputs } => {
                inputs
            }
        }
    }
}

/// Builds a distribution from an allocation file and writes its dump.
fn generate(args: cli::GenerateArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let inputs = serde_json::from_str::<AllocationFile>(&raw)
        .with_context(|| format!("{} is not an allocation list", args.input.display()))?
        .into_inputs();

    let tree = MerkleTree::from_strings(&inputs).context("allocation batch rejected")?;
    tree.dump()
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    tracing::info!(
        output = %args.output.display(),
        leaves = tree.len(),
        depth = tree.depth(),
        "distribution written"
    );
    println!("{}", tree.root_hex());
    Ok(())
}

/// Prints one address's entry from a dump.
fn proof(args: cli::ProofArgs) -> Result<()> {
    let dump = Dump::load(&args.dump)
        .with_context(|| format!("failed to load {}", args.dump.display()))?;
    let address = Address::parse(&args.address)
        .with_context(|| format!("invalid address: {}", args.address))?;
    let entry = dump.find(&address)?;

    let out = serde_json::json!({
        "root": dump.root,
        "address": entry.value[0],
        "amount": entry.value[1],
        "treeIndex": entry.tree_index,
        "proof": entry.proof,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Checks a dump and prints a short report.
fn verify(args: cli::VerifyArgs) -> Result<()> {
    let tree = load_tree(&args.dump)?;
    if args.deep {
        tree.validate()
            .with_context(|| format!("{} failed full rehash", args.dump.display()))?;
    }

    let out = serde_json::json!({
        "root": tree.root_hex(),
        "leaves": tree.len(),
        "depth": tree.depth(),
        "rehashed": args.deep,
        "ok": true,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn load_tree(path: &Path) -> Result<MerkleTree> {
    let dump =
        Dump::load(path).with_context(|| format!("failed to load {}", path.display()))?;
    MerkleTree::from_dump(&dump).with_context(|| format!("{} is not a valid dump", path.display()))
}

/// Prints version information to stdout.
fn print_version() {
    println!("airdrop-node {}", env!("CARGO_PKG_VERSION"));
    println!("format       {}", airdrop_protocol::config::DUMP_FORMAT);
    println!(
        "leaf         ({})",
        airdrop_protocol::config::LEAF_ENCODING.join(", ")
    );
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. A handler that fails
/// to install is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_file_accepts_both_shapes() {
        let bare = r#"[{"address":"0x1111111111111111111111111111111111111111","amount":"5"}]"#;
        let wrapped = format!(r#"{{"allocations":{}}}"#, bare);
        let a = serde_json::from_str::<AllocationFile>(bare).unwrap().into_inputs();
        let b = serde_json::from_str::<AllocationFile>(&wrapped)
            .unwrap()
            .into_inputs();
        assert_eq!(a, b);
        assert_eq!(a[0].amount, "5");
    }

    #[test]
    fn generate_then_verify_and_proof() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("allocations.json");
        let output = dir.path().join("merkle-tree.json");
        std::fs::write(
            &input,
            r#"{"allocations":[
                {"address":"0x1111111111111111111111111111111111111111","amount":"1000"},
                {"address":"0x2222222222222222222222222222222222222222","amount":"2000"},
                {"address":"0x3333333333333333333333333333333333333333","amount":"3000"}
            ]}"#,
        )
        .unwrap();

        generate(cli::GenerateArgs {
            input: input.clone(),
            output: output.clone(),
        })
        .unwrap();
        let tree = load_tree(&output).unwrap();
        assert_eq!(tree.len(), 3);

        verify(cli::VerifyArgs {
            dump: output.clone(),
            deep: true,
        })
        .unwrap();
        proof(cli::ProofArgs {
            dump: output.clone(),
            address: "0x2222222222222222222222222222222222222222".into(),
        })
        .unwrap();
        assert!(proof(cli::ProofArgs {
            dump: output,
            address: "0x4444444444444444444444444444444444444444".into(),
        })
        .is_err());
    }

    #[test]
    fn generate_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("allocations.json");
        let output = dir.path().join("merkle-tree.json");
        std::fs::write(&input, r#"[{"address":"0x12","amount":"1"}]"#).unwrap();

        assert!(generate(cli::GenerateArgs {
            input,
            output: output.clone(),
        })
        .is_err());
        assert!(!output.exists());
    }
}
