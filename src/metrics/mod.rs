//! Self-observability metrics for the meter.
//!
//! The meter reports on its own activity through Prometheus counters and gauges.
//! They are always updated (atomic operations) and can optionally be exposed
//! via a Prometheus registry for scraping.
//!
//! # Available Metrics
//!
//! ## Gauges (current values)
//!
//! - `meter_live_entities` - Entity recorders currently live
//!
//! ## Counters (cumulative)
//!
//! - `meter_registered_entities` - Entities accepted and given a recorder
//! - `meter_rejected_entities` - Entities rejected by the filter
//! - `meter_removed_entities` - Recorders removed on teardown
//! - `meter_refresh_cycles` - Completed gauge refresh cycles
//! - `meter_refresh_failures` - Gauge refreshes whose provider failed
//! - `meter_collection_cycles` - Completed collection cycles
//! - `meter_snapshots_collected` - Entity snapshots produced
//!
//! The `meter` prefix follows [`MeterConfig::prefix`](crate::MeterConfig::prefix).

mod prometheus;

pub use self::prometheus::MeterMetrics;
