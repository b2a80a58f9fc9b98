//! Prometheus self-metrics for the meter.
//!
//! Counters work standalone without a Registry - registration is only needed
//! for exposition (scraping).
//!
//! # Usage
//!
//! ```ignore
//! // Pattern 1: No exposition (counters still work internally)
//! let meter = MeterBuilder::new().build()?;
//!
//! // Pattern 2: External registry for scraping
//! let registry = prometheus::Registry::new();
//! let meter = MeterBuilder::new()
//!     .prometheus_registry(registry.clone())
//!     .build()?;
//! ```

use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Prometheus metrics describing the meter itself.
///
/// Cloned metrics share the same underlying counters.
#[derive(Clone)]
pub struct MeterMetrics {
    // === Entity lifecycle ===
    /// Entities accepted by the filter and given a recorder
    pub registered_entities: IntCounter,

    /// Entities rejected by the filter
    pub rejected_entities: IntCounter,

    /// Recorders removed on teardown
    pub removed_entities: IntCounter,

    /// Recorders currently live
    pub live_entities: IntGauge,

    // === Refresh path ===
    /// Completed refresh cycles
    pub refresh_cycles: IntCounter,

    /// Gauge refreshes whose provider failed
    pub refresh_failures: IntCounter,

    // === Collection path ===
    /// Completed collection cycles
    pub collection_cycles: IntCounter,

    /// Snapshots produced across all collection cycles
    pub snapshots_collected: IntCounter,
}

impl Default for MeterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterMetrics {
    /// Create metrics with default prefix "meter".
    pub fn new() -> Self {
        Self::with_prefix("meter")
    }

    /// Create metrics with a custom prefix.
    ///
    /// Metric names will be `{prefix}_registered_entities`, `{prefix}_refresh_cycles`, etc.
    /// Characters not valid in a Prometheus metric name are replaced with underscores.
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = sanitize_prefix(prefix);
        Self {
            registered_entities: counter(&prefix, "registered_entities", "Entities given a recorder"),
            rejected_entities: counter(&prefix, "rejected_entities", "Entities rejected by the filter"),
            removed_entities: counter(&prefix, "removed_entities", "Entity recorders removed"),
            live_entities: IntGauge::with_opts(Opts::new(
                format!("{}_live_entities", prefix),
                "Entity recorders currently live",
            ))
            .expect("metric creation should not fail"),
            refresh_cycles: counter(&prefix, "refresh_cycles", "Completed gauge refresh cycles"),
            refresh_failures: counter(&prefix, "refresh_failures", "Failed gauge refreshes"),
            collection_cycles: counter(&prefix, "collection_cycles", "Completed collection cycles"),
            snapshots_collected: counter(&prefix, "snapshots_collected", "Entity snapshots collected"),
        }
    }

    /// Register all metrics with a Registry for exposition.
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register (e.g., duplicate names).
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.registered_entities.clone()))?;
        registry.register(Box::new(self.rejected_entities.clone()))?;
        registry.register(Box::new(self.removed_entities.clone()))?;
        registry.register(Box::new(self.live_entities.clone()))?;
        registry.register(Box::new(self.refresh_cycles.clone()))?;
        registry.register(Box::new(self.refresh_failures.clone()))?;
        registry.register(Box::new(self.collection_cycles.clone()))?;
        registry.register(Box::new(self.snapshots_collected.clone()))?;
        Ok(())
    }

    /// Record a finished refresh cycle.
    #[inline]
    pub fn record_refresh(&self, failures: usize) {
        self.refresh_cycles.inc();
        self.refresh_failures.inc_by(failures as u64);
    }

    /// Record a finished collection cycle.
    #[inline]
    pub fn record_collection(&self, snapshots: usize) {
        self.collection_cycles.inc();
        self.snapshots_collected.inc_by(snapshots as u64);
    }
}

fn counter(prefix: &str, name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(format!("{}_{}", prefix, name), help))
        .expect("metric creation should not fail")
}

// Valid chars: [a-zA-Z_:] for first char, [a-zA-Z0-9_:] for rest
fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let valid = if i == 0 {
                c.is_ascii_alphabetic() || c == '_' || c == ':'
            } else {
                c.is_ascii_alphanumeric() || c == '_' || c == ':'
            };
            if valid {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl std::fmt::Debug for MeterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeterMetrics")
            .field("live_entities", &self.live_entities.get())
            .field("registered_entities", &self.registered_entities.get())
            .field("refresh_cycles", &self.refresh_cycles.get())
            .field("collection_cycles", &self.collection_cycles.get())
            .finish()
    }
}
