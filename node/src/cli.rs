//! # CLI Interface
//!
//! Defines the command-line argument structure for `airdrop-node` using
//! `clap` derive. Five subcommands: `serve`, `generate`, `proof`, `verify`
//! and `version`. Every flag that matters in deployment also reads an
//! `AIRDROP_*` environment variable.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use airdrop_protocol::config::{DEFAULT_API_PORT, DEFAULT_LEDGER_TIMEOUT, DEFAULT_METRICS_PORT};

use crate::logging::LogFormat;

/// Cumulative Merkle airdrop node.
///
/// Builds distribution trees, serves proofs and claim state over HTTP,
/// publishes roots to the ledger, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "airdrop-node",
    about = "Cumulative Merkle airdrop node",
    version,
    propagate_version = true
)]
pub struct AirdropNodeCli {
    #[command(flatten)]
    pub log: LogArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the airdrop node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API against an in-memory ledger.
    Serve(ServeArgs),
    /// Build a distribution from an allocation file and write the dump.
    Generate(GenerateArgs),
    /// Print the allocation and proof for one address from a dump.
    Proof(ProofArgs),
    /// Check a dump's structure, and optionally rehash every node.
    Verify(VerifyArgs),
    /// Print version information and exit.
    Version,
}

/// Logging flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Log output format.
    #[arg(long, global = true, env = "AIRDROP_LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,

    /// Default filter when `RUST_LOG` is not set.
    #[arg(
        long,
        global = true,
        env = "AIRDROP_LOG_LEVEL",
        default_value = "airdrop_node=info,airdrop_protocol=info,airdrop_contracts=info,tower_http=debug"
    )]
    pub log_level: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port for the REST and WebSocket API.
    #[arg(long, env = "AIRDROP_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "AIRDROP_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Dump file. Loaded as the active distribution at startup if it
    /// exists; every generated distribution is saved here.
    #[arg(long, env = "AIRDROP_DUMP")]
    pub dump: Option<PathBuf>,

    /// Operator account that owns the distributor and signs root updates.
    #[arg(
        long,
        env = "AIRDROP_OPERATOR",
        default_value = "0x0000000000000000000000000000000000000001"
    )]
    pub operator: String,

    /// Seconds to wait on a single ledger call.
    #[arg(long, env = "AIRDROP_LEDGER_TIMEOUT_SECS", default_value_t = DEFAULT_LEDGER_TIMEOUT.as_secs())]
    pub ledger_timeout_secs: u64,

    /// Publish the loaded distribution's root at startup.
    #[arg(long, env = "AIRDROP_PUBLISH_ON_START")]
    pub publish_on_start: bool,
}

/// Arguments for the `generate` subcommand.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// JSON allocation file: either `[{address, amount}, ...]` or
    /// `{"allocations": [...]}`.
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Where to write the dump.
    #[arg(long, short = 'o', default_value = "merkle-tree.json")]
    pub output: PathBuf,
}

/// Arguments for the `proof` subcommand.
#[derive(Args, Debug)]
pub struct ProofArgs {
    /// Dump file to read.
    #[arg(long, short = 'd', env = "AIRDROP_DUMP")]
    pub dump: PathBuf,

    /// Recipient address.
    #[arg(long, short = 'a')]
    pub address: String,
}

/// Arguments for the `verify` subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Dump file to read.
    #[arg(long, short = 'd', env = "AIRDROP_DUMP")]
    pub dump: PathBuf,

    /// Also rehash every leaf and internal node.
    #[arg(long)]
    pub deep: bool,
}
