//! # Prometheus Metrics
//!
//! Operational metrics for the airdrop node, scraped at `/metrics` on the
//! configured metrics port. Everything lives in a dedicated
//! [`prometheus::Registry`] prefixed `airdrop_`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc` internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Distributions built successfully.
    pub trees_generated_total: IntCounter,
    /// Allocation batches rejected by validation.
    pub generation_failures_total: IntCounter,
    /// Allocations hashed into successful trees.
    pub allocations_processed_total: IntCounter,
    /// Leaves in the active distribution.
    pub active_leaves: IntGauge,
    /// Root publications that sent a transaction.
    pub root_updates_total: IntCounter,
    /// Root publications skipped because the ledger already had the root.
    pub root_updates_unchanged_total: IntCounter,
    /// Root publications or claims whose read-back did not match.
    pub inconsistent_readbacks_total: IntCounter,
    /// Confirmed claims.
    pub claims_total: IntCounter,
    /// Claims refused or failed for any reason.
    pub claim_failures_total: IntCounter,
    /// Ledger calls that timed out.
    pub ledger_timeouts_total: IntCounter,
    /// Wall time spent building a tree, in seconds.
    pub tree_generation_seconds: Histogram,
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, metric: C) -> prometheus::Result<C> {
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("airdrop".into()), None)?;

        Ok(Self {
            trees_generated_total: register(
                &registry,
                IntCounter::new("trees_generated_total", "Distributions built successfully")?,
            )?,
            generation_failures_total: register(
                &registry,
                IntCounter::new(
                    "generation_failures_total",
                    "Allocation batches rejected by validation",
                )?,
            )?,
            allocations_processed_total: register(
                &registry,
                IntCounter::new(
                    "allocations_processed_total",
                    "Allocations hashed into successful trees",
                )?,
            )?,
            active_leaves: register(
                &registry,
                IntGauge::new("active_leaves", "Leaves in the active distribution")?,
            )?,
            root_updates_total: register(
                &registry,
                IntCounter::new("root_updates_total", "Root publications that sent a transaction")?,
            )?,
            root_updates_unchanged_total: register(
                &registry,
                IntCounter::new(
                    "root_updates_unchanged_total",
                    "Root publications skipped because the root was already published",
                )?,
            )?,
            inconsistent_readbacks_total: register(
                &registry,
                IntCounter::new(
                    "inconsistent_readbacks_total",
                    "Ledger read-backs that did not match the submitted value",
                )?,
            )?,
            claims_total: register(
                &registry,
                IntCounter::new("claims_total", "Confirmed claims")?,
            )?,
            claim_failures_total: register(
                &registry,
                IntCounter::new("claim_failures_total", "Claims refused or failed")?,
            )?,
            ledger_timeouts_total: register(
                &registry,
                IntCounter::new("ledger_timeouts_total", "Ledger calls that timed out")?,
            )?,
            tree_generation_seconds: register(
                &registry,
                Histogram::with_opts(
                    HistogramOpts::new(
                        "tree_generation_seconds",
                        "Wall time spent building a distribution tree",
                    )
                    .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
                )?,
            )?,
            registry,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_contains_prefixed_names() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.trees_generated_total.inc();
        metrics.tree_generation_seconds.observe(0.002);
        let text = metrics.encode().unwrap();
        assert!(text.contains("airdrop_trees_generated_total 1"));
        assert!(text.contains("airdrop_tree_generation_seconds_bucket"));
    }
}
