//! # Structured Logging
//!
//! Initializes the `tracing` subscriber with configurable format (JSON or
//! pretty-printed) and environment-based filtering via `RUST_LOG`.
//!
//! Logs go to stderr. `generate` prints the new root, and `proof` and
//! `verify` print JSON reports, all on stdout, so the CLI can be piped
//! into `jq` or captured in scripts while logging stays on.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored output. Suitable for local development.
    Pretty,
    /// Machine-parseable JSON lines. Suitable for production log aggregation.
    Json,
}

/// Filter to install: `RUST_LOG` when it is set, else `default_level`.
///
/// A malformed `RUST_LOG` falls back to `default_level`, but a malformed
/// `default_level` (it comes from `--log-level`) is an error.
pub fn build_filter(default_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => parse_filter(default_level),
    }
}

fn parse_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives).with_context(|| format!("invalid log filter: {directives}"))
}

/// Initialize the global tracing subscriber.
///
/// Call once, early in `main()`. A second call returns an error instead of
/// replacing the subscriber.
///
/// # Arguments
///
/// * `default_level` - The default filter when `RUST_LOG` is not set,
///   e.g. `"airdrop_node=debug,airdrop_protocol=info"`.
/// * `format` - Output format (JSON or pretty-printed).
///
/// # Environment
///
/// The `RUST_LOG` environment variable overrides `default_level` when set:
///
/// ```text
/// RUST_LOG=airdrop_node=debug,airdrop_protocol=debug,tower_http=debug
/// ```
pub fn init_logging(default_level: &str, format: LogFormat) -> Result<()> {
    let env_filter = build_filter(default_level)?;

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init(),
    }
    .context("a global tracing subscriber is already installed")?;

    tracing::debug!(?format, "logging initialized");
    Ok(())
}
