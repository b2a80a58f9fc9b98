//! The meter: lifecycle entry point tying the registry to the two tickers.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          Meter                           │
//! │  registry: EntityRegistry (filter-gated recorders)       │
//! └──────────────────────────────────────────────────────────┘
//!      │ refresh ticker               │ collection ticker
//!      ▼ (refresh_interval)           ▼ (tick_interval)
//!  Gauge::refresh on every      EntityRecorder::collect on every
//!  live recorder                live recorder → SnapshotSink
//! ```
//!
//! Worker threads update min/max counters directly through the recorder they
//! obtained from [`Meter::on_entity_created`] and never touch the meter itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::MeterConfig;
use crate::dispatcher::{dispatcher_providers, DispatcherSensor, DISPATCHER_CATEGORY, PARALLELISM};
use crate::error::{MeterError, Result};
use crate::filter::EntityFilter;
use crate::instrument::{InstrumentDescriptor, Providers};
use crate::metrics::MeterMetrics;
use crate::recorder::{EntityRecorder, RefreshReport};
use crate::registry::EntityRegistry;
use crate::snapshot::{CollectionContext, Snapshot};
use crate::ticker::Ticker;

/// Snapshots of every live entity from one collection cycle.
#[derive(Debug, Clone)]
pub struct CollectionBatch {
    /// Monotonic cycle number, starting at 1.
    pub cycle: u64,
    pub taken_at: SystemTime,
    pub snapshots: Vec<Snapshot>,
}

impl CollectionBatch {
    /// The snapshot of one entity, if it was live during the cycle.
    pub fn find(&self, category: &str, name: &str) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .find(|s| s.key().category() == category && s.key().name() == name)
    }
}

/// Downstream consumer of collection batches.
pub trait SnapshotSink: Send + Sync + 'static {
    fn accept(&self, batch: CollectionBatch);
}

impl<F> SnapshotSink for F
where
    F: Fn(CollectionBatch) + Send + Sync + 'static,
{
    fn accept(&self, batch: CollectionBatch) {
        self(batch)
    }
}

impl SnapshotSink for mpsc::UnboundedSender<CollectionBatch> {
    fn accept(&self, batch: CollectionBatch) {
        if self.send(batch).is_err() {
            debug!("snapshot receiver dropped, discarding batch");
        }
    }
}

struct Tickers {
    refresh: Ticker,
    collection: Ticker,
}

/// Entity-scoped metrics engine.
///
/// Build one per process with [`MeterBuilder`](crate::MeterBuilder) (or
/// [`Meter::new`]), share it as `Arc<Meter>` with the runtime that owns the
/// monitored entities, then [`start`](Self::start) the tickers and
/// [`shutdown`](Self::shutdown) when done.
pub struct Meter {
    config: MeterConfig,
    registry: Arc<EntityRegistry>,
    metrics: MeterMetrics,
    cycle: AtomicU64,
    tickers: Mutex<Option<Tickers>>,
}

impl Meter {
    /// Create a meter from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if either interval is zero.
    pub fn new(config: MeterConfig) -> Result<Self> {
        config.validate()?;

        let metrics = MeterMetrics::with_prefix(&config.prefix);
        if let Some(ref registry) = config.prometheus_registry {
            if let Err(e) = metrics.register(registry) {
                warn!(%e, "failed to register prometheus metrics");
            }
        }

        let filter = EntityFilter::from_config(&config.filters);
        let registry = Arc::new(EntityRegistry::with_metrics(filter, metrics.clone()));

        info!(
            prefix = %config.prefix,
            tick_interval = ?config.tick_interval,
            refresh_interval = ?config.refresh_interval,
            categories = config.filters.len(),
            "building meter"
        );

        Ok(Self {
            config,
            registry,
            metrics,
            cycle: AtomicU64::new(0),
            tickers: Mutex::new(None),
        })
    }

    /// Get the resolved configuration.
    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// The registry of live recorders.
    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    /// The meter's self-metrics.
    pub fn metrics(&self) -> &MeterMetrics {
        &self.metrics
    }

    /// Lifecycle hook: an entity appeared.
    ///
    /// Returns the entity's recorder, or `None` when the filter rejects it.
    /// Calling it again for a live entity returns the same recorder.
    pub fn on_entity_created(
        &self,
        category: &str,
        name: &str,
        descriptors: &[InstrumentDescriptor],
        providers: &Providers,
    ) -> Result<Option<Arc<EntityRecorder>>> {
        self.registry.register(category, name, descriptors, providers)
    }

    /// Lifecycle hook: an entity is gone. Unknown entities are ignored.
    pub fn on_entity_destroyed(&self, category: &str, name: &str) -> bool {
        self.registry.remove(category, name)
    }

    /// Look up the recorder of a live entity.
    pub fn find(&self, category: &str, name: &str) -> Option<Arc<EntityRecorder>> {
        self.registry.find(category, name)
    }

    /// Register a dispatcher, seeding its instruments from `sensor`.
    pub fn register_dispatcher(
        &self,
        name: &str,
        sensor: Arc<dyn DispatcherSensor>,
    ) -> Result<Option<Arc<EntityRecorder>>> {
        let kind = sensor.kind();
        let providers = dispatcher_providers(&sensor);
        let recorder =
            self.registry
                .register(DISPATCHER_CATEGORY, name, kind.descriptors(), &providers)?;
        if let Some(ref recorder) = recorder {
            if let Some(parallelism) = recorder.min_max_counter(PARALLELISM) {
                parallelism.set(sensor.parallelism());
            }
        }
        Ok(recorder)
    }

    /// Remove a dispatcher's recorder.
    pub fn unregister_dispatcher(&self, name: &str) -> bool {
        self.registry.remove(DISPATCHER_CATEGORY, name)
    }

    /// Run one refresh cycle over every gauge of every live recorder.
    pub fn refresh_all(&self) -> RefreshReport {
        let mut report = RefreshReport::default();
        for recorder in self.registry.recorders() {
            report += recorder.refresh();
        }
        self.metrics.record_refresh(report.failed);
        report
    }

    /// Run one collection cycle over every live recorder.
    pub fn collect_all(&self, ctx: &mut CollectionContext) -> CollectionBatch {
        ctx.begin_cycle();
        let snapshots: Vec<Snapshot> = self
            .registry
            .recorders()
            .iter()
            .map(|recorder| recorder.collect(ctx))
            .collect();
        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;
        self.metrics.record_collection(snapshots.len());
        debug!(cycle, snapshots = snapshots.len(), "collection cycle finished");

        CollectionBatch {
            cycle,
            taken_at: SystemTime::now(),
            snapshots,
        }
    }

    /// Start the refresh and collection tickers on `runtime`.
    ///
    /// Every collection batch is handed to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`MeterError::AlreadyRunning`] if the tickers are running.
    pub fn start(self: &Arc<Self>, runtime: &Handle, sink: impl SnapshotSink) -> Result<()> {
        let mut tickers = self.tickers.lock();
        if tickers.is_some() {
            return Err(MeterError::AlreadyRunning);
        }

        let weak: Weak<Meter> = Arc::downgrade(self);
        let refresh = Ticker::spawn(
            runtime,
            "meter-refresh",
            self.config.refresh_interval,
            move || {
                if let Some(meter) = weak.upgrade() {
                    meter.refresh_all();
                }
            },
        );

        let weak: Weak<Meter> = Arc::downgrade(self);
        let ctx = Mutex::new(CollectionContext::new());
        let collection = Ticker::spawn(
            runtime,
            "meter-collection",
            self.config.tick_interval,
            move || {
                if let Some(meter) = weak.upgrade() {
                    let batch = meter.collect_all(&mut ctx.lock());
                    sink.accept(batch);
                }
            },
        );

        *tickers = Some(Tickers {
            refresh,
            collection,
        });
        info!(prefix = %self.config.prefix, "meter started");
        Ok(())
    }

    /// Whether the tickers are running.
    pub fn is_running(&self) -> bool {
        self.tickers.lock().is_some()
    }

    /// Stop both tickers. Live recorders stay registered. Idempotent.
    pub fn shutdown(&self) {
        if let Some(tickers) = self.tickers.lock().take() {
            tickers.refresh.cancel();
            tickers.collection.cancel();
            info!(
                prefix = %self.config.prefix,
                refresh_ticks = tickers.refresh.ticks(),
                collection_ticks = tickers.collection.ticks(),
                "meter shut down"
            );
        }
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter")
            .field("config", &self.config)
            .field("live_entities", &self.registry.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
