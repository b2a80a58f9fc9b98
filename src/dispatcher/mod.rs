//! Dispatcher category: instruments describing thread-pool-backed dispatchers.
//!
//! The runtime owning a dispatcher exposes its statistics through a
//! [`DispatcherSensor`] and registers it with
//! [`Meter::register_dispatcher`](crate::Meter::register_dispatcher). The
//! sensor is only read during gauge refresh.
//!
//! # Instruments
//!
//! | Name | Kind | Fork-join | Thread-pool executor |
//! |------|------|:---------:|:--------------------:|
//! | `parallelism` | min/max counter | ✓ | |
//! | `pool-size` | gauge | ✓ | ✓ |
//! | `active-threads` | gauge | ✓ | ✓ |
//! | `running-threads` | gauge | ✓ | |
//! | `queued-task-count` | gauge | ✓ | |
//! | `core-pool-size` | gauge | | ✓ |
//! | `max-pool-size` | gauge | | ✓ |
//! | `processed-tasks` | gauge (per-window delta) | | ✓ |

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::instrument::{DifferentialProvider, Fallible, InstrumentDescriptor, ProviderError, Providers};

mod pool;

pub use pool::MonitoredPool;

/// Category under which dispatchers are registered.
pub const DISPATCHER_CATEGORY: &str = "dispatcher";

pub const PARALLELISM: &str = "parallelism";
pub const POOL_SIZE: &str = "pool-size";
pub const ACTIVE_THREADS: &str = "active-threads";
pub const RUNNING_THREADS: &str = "running-threads";
pub const QUEUED_TASK_COUNT: &str = "queued-task-count";
pub const CORE_POOL_SIZE: &str = "core-pool-size";
pub const MAX_POOL_SIZE: &str = "max-pool-size";
pub const PROCESSED_TASKS: &str = "processed-tasks";

const FORK_JOIN_DESCRIPTORS: &[InstrumentDescriptor] = &[
    InstrumentDescriptor::min_max_counter(PARALLELISM),
    InstrumentDescriptor::gauge(POOL_SIZE),
    InstrumentDescriptor::gauge(ACTIVE_THREADS),
    InstrumentDescriptor::gauge(RUNNING_THREADS),
    InstrumentDescriptor::gauge(QUEUED_TASK_COUNT),
];

const THREAD_POOL_EXECUTOR_DESCRIPTORS: &[InstrumentDescriptor] = &[
    InstrumentDescriptor::gauge(CORE_POOL_SIZE),
    InstrumentDescriptor::gauge(MAX_POOL_SIZE),
    InstrumentDescriptor::gauge(POOL_SIZE),
    InstrumentDescriptor::gauge(ACTIVE_THREADS),
    InstrumentDescriptor::gauge(PROCESSED_TASKS),
];

const ALL_DESCRIPTORS: &[InstrumentDescriptor] = &[
    InstrumentDescriptor::gauge(ACTIVE_THREADS),
    InstrumentDescriptor::gauge(POOL_SIZE),
    InstrumentDescriptor::gauge(MAX_POOL_SIZE),
    InstrumentDescriptor::gauge(CORE_POOL_SIZE),
    InstrumentDescriptor::gauge(PROCESSED_TASKS),
    InstrumentDescriptor::gauge(QUEUED_TASK_COUNT),
    InstrumentDescriptor::gauge(RUNNING_THREADS),
    InstrumentDescriptor::min_max_counter(PARALLELISM),
];

/// Shape of the pool behind a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatcherKind {
    /// Work-stealing pool with a fixed parallelism.
    ForkJoin,
    /// Pool with core/max sizing and a task queue.
    ThreadPoolExecutor,
}

impl DispatcherKind {
    /// Instruments declared for this kind of dispatcher.
    pub fn descriptors(self) -> &'static [InstrumentDescriptor] {
        match self {
            DispatcherKind::ForkJoin => FORK_JOIN_DESCRIPTORS,
            DispatcherKind::ThreadPoolExecutor => THREAD_POOL_EXECUTOR_DESCRIPTORS,
        }
    }
}

/// Every instrument name the dispatcher category knows about.
pub fn dispatcher_descriptors_all() -> &'static [InstrumentDescriptor] {
    ALL_DESCRIPTORS
}

/// Typed view of a dispatcher's pool statistics.
///
/// Implemented by the runtime that owns the pool. Accessors should be cheap
/// local reads; they run on the refresh path only.
pub trait DispatcherSensor: Send + Sync {
    fn kind(&self) -> DispatcherKind;

    /// Configured parallelism.
    fn parallelism(&self) -> i64;

    /// Threads currently in the pool.
    fn pool_size(&self) -> i64;

    fn core_pool_size(&self) -> i64 {
        self.pool_size()
    }

    fn max_pool_size(&self) -> i64 {
        self.pool_size()
    }

    /// Threads executing a task.
    fn active_threads(&self) -> i64;

    /// Threads not blocked waiting for work.
    fn running_threads(&self) -> i64 {
        self.active_threads()
    }

    /// Tasks submitted but not started.
    fn queued_task_count(&self) -> i64;

    /// Tasks completed since the pool started. Monotonic.
    fn processed_tasks(&self) -> i64;

    /// Whether the pool was shut down. Gauges of a terminated pool stop refreshing.
    fn is_terminated(&self) -> bool;

    /// Shut the pool down.
    fn shutdown(&self);
}

/// Build the gauge providers for a dispatcher.
///
/// `processed-tasks` reports the tasks completed since the previous refresh.
pub fn dispatcher_providers(sensor: &Arc<dyn DispatcherSensor>) -> Providers {
    fn read(
        sensor: &Arc<dyn DispatcherSensor>,
        f: fn(&dyn DispatcherSensor) -> i64,
    ) -> Fallible<impl Fn() -> Result<i64, ProviderError> + Send + Sync + 'static> {
        let sensor = Arc::clone(sensor);
        Fallible(move || {
            if sensor.is_terminated() {
                Err(ProviderError::Unavailable)
            } else {
                Ok(f(&*sensor))
            }
        })
    }

    Providers::new()
        .with(POOL_SIZE, read(sensor, |s| s.pool_size()))
        .with(CORE_POOL_SIZE, read(sensor, |s| s.core_pool_size()))
        .with(MAX_POOL_SIZE, read(sensor, |s| s.max_pool_size()))
        .with(ACTIVE_THREADS, read(sensor, |s| s.active_threads()))
        .with(RUNNING_THREADS, read(sensor, |s| s.running_threads()))
        .with(QUEUED_TASK_COUNT, read(sensor, |s| s.queued_task_count()))
        .with(
            PROCESSED_TASKS,
            DifferentialProvider::new(read(sensor, |s| s.processed_tasks())),
        )
}
