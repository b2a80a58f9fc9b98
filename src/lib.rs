//! # meter-rs
//!
//! **Entity-scoped metrics for the pools doing your work**
//!
//! A small instrumentation engine that keeps per-entity instruments (gauges and
//! min/max counters) for runtime entities such as thread-pool dispatchers,
//! refreshes them on a short interval and collects them into periodic snapshots.
//!
//! ## Features
//!
//! - **Entity Lifecycle Hooks**: recorders are created when an entity appears and removed when it goes away
//! - **Filter-Gated**: per-category include/exclude glob rules decide which entities are recorded
//! - **Lock-Free Hot Path**: min/max counter updates are plain atomics
//! - **Pull Gauges**: gauges sample a provider on the refresh ticker and summarize the window
//! - **Flexible Configuration**: configure via files (TOML/YAML/JSON), environment variables, or code
//! - **CLI Integration**: built-in clap support for command-line overrides
//! - **Self-Metrics**: the meter's own activity as Prometheus counters
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use meter_rs::{DispatcherKind, MeterBuilder, MonitoredPool};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = tokio::runtime::Runtime::new()?;
//!     let meter = Arc::new(
//!         MeterBuilder::new()
//!             .include("dispatcher", "*")
//!             .exclude("dispatcher", "internal-*")
//!             .build()?,
//!     );
//!
//!     let pool = Arc::new(MonitoredPool::new("workers", DispatcherKind::ThreadPoolExecutor, 4)?);
//!     meter.register_dispatcher("workers", pool.clone())?;
//!
//!     meter.start(runtime.handle(), |batch: meter_rs::CollectionBatch| {
//!         for snapshot in &batch.snapshots {
//!             println!("{}: {} instruments", snapshot.key(), snapshot.len());
//!         }
//!     })?;
//!
//!     pool.spawn(|| expensive_work())?;
//!
//!     meter.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Configuration sources are merged in order (later sources override earlier):
//!
//! 1. Default values
//! 2. Config files (via `.file()`)
//! 3. Environment variables (via `.env_prefix()`)
//! 4. Programmatic overrides
//! 5. CLI arguments (via `.with_cli_args()`)
//!
//! ### Config File Example (TOML)
//!
//! ```toml
//! prefix = "myapp"
//! tick_interval = "10s"
//! refresh_interval = "100ms"
//!
//! [filters.dispatcher]
//! includes = ["*"]
//! excludes = ["internal-*"]
//! ```
//!
//! ### Environment Variables
//!
//! With `.env_prefix("METER")`:
//! - `METER_PREFIX=myapp`
//! - `METER_TICK_INTERVAL=5s`
//! - `METER_REFRESH_INTERVAL=50ms`
//!
//! Filters are not read from the environment.
//!
//! ## Filters
//!
//! A category without a rule records nothing. Within a rule an exclude match
//! always wins over an include match. Patterns use shell glob syntax (`*`, `?`,
//! `[abc]`). A rule with a malformed pattern rejects every entity of its
//! category and logs a warning.

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod instrument;
pub mod meter;
pub mod metrics;
pub mod recorder;
pub mod registry;
pub mod snapshot;
pub mod ticker;

pub use builder::{MeterArgs, MeterBuilder};
pub use config::{FilterConfig, MeterConfig};
pub use dispatcher::{
    dispatcher_descriptors_all, dispatcher_providers, DispatcherKind, DispatcherSensor,
    MonitoredPool, DISPATCHER_CATEGORY,
};
pub use error::{MeterError, Result};
pub use filter::EntityFilter;
pub use instrument::{
    DifferentialProvider, Fallible, Gauge, GaugeSummary, Instrument, InstrumentDescriptor,
    InstrumentKind, InstrumentSummary, MinMaxCounter, MinMaxSummary, ProviderError, Providers,
    ValueProvider,
};
pub use meter::{CollectionBatch, Meter, SnapshotSink};
pub use metrics::MeterMetrics;
pub use recorder::{EntityKey, EntityRecorder, RefreshReport};
pub use registry::EntityRegistry;
pub use snapshot::{CollectionContext, Snapshot};
pub use ticker::Ticker;
