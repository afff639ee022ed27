//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_syncs_total` - Committed balance syncs
//! - `ledger_sync_rejections_total` - Syncs rejected for insufficient balance
//! - `ledger_issuances_total` - Committed issuance changes
//! - `ledger_issuance_rejections_total` - Issuances rejected (below circulating supply)
//! - `ledger_operation_duration_seconds` - Histogram of ledger call latencies

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
///
/// Owns its registry, so several ledgers (tests, embedded use) can coexist
/// in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Committed syncs
    pub syncs_total: IntCounter,

    /// Rejected syncs
    pub sync_rejections: IntCounter,

    /// Committed issuances
    pub issuances_total: IntCounter,

    /// Rejected issuances
    pub issuance_rejections: IntCounter,

    /// Ledger call duration histogram
    pub operation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let syncs_total = IntCounter::new("ledger_syncs_total", "Committed balance syncs")?;
        registry.register(Box::new(syncs_total.clone()))?;

        let sync_rejections = IntCounter::new(
            "ledger_sync_rejections_total",
            "Syncs rejected for insufficient balance",
        )?;
        registry.register(Box::new(sync_rejections.clone()))?;

        let issuances_total =
            IntCounter::new("ledger_issuances_total", "Committed issuance changes")?;
        registry.register(Box::new(issuances_total.clone()))?;

        let issuance_rejections = IntCounter::new(
            "ledger_issuance_rejections_total",
            "Issuances rejected below circulating supply",
        )?;
        registry.register(Box::new(issuance_rejections.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_operation_duration_seconds",
                "Histogram of ledger call latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            syncs_total,
            sync_rejections,
            issuances_total,
            issuance_rejections,
            operation_duration,
            registry,
        })
    }

    /// Record a committed sync
    pub fn record_sync(&self) {
        self.syncs_total.inc();
    }

    /// Record a rejected sync
    pub fn record_sync_rejected(&self) {
        self.sync_rejections.inc();
    }

    /// Record a committed issuance
    pub fn record_issuance(&self) {
        self.issuances_total.inc();
    }

    /// Record a rejected issuance
    pub fn record_issuance_rejected(&self) {
        self.issuance_rejections.inc();
    }

    /// Record ledger call duration
    pub fn record_duration(&self, duration_seconds: f64) {
        self.operation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every metric in the Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
