//! Rayon pool that keeps the statistics a [`DispatcherSensor`] reports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{DispatcherKind, DispatcherSensor};
use crate::error::{MeterError, Result};

struct TaskCounters {
    submitted: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl TaskCounters {
    fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
        }
    }

    fn is_idle(&self) -> bool {
        self.completed.load(Ordering::Acquire) >= self.submitted.load(Ordering::Acquire)
    }
}

/// Marks a task as started; marks it completed on drop, including when the
/// task panics.
struct TaskGuard {
    counters: Arc<TaskCounters>,
}

impl TaskGuard {
    fn start(counters: Arc<TaskCounters>) -> Self {
        counters.started.fetch_add(1, Ordering::AcqRel);
        Self { counters }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.counters.completed.fetch_add(1, Ordering::AcqRel);
        if self.counters.is_idle() {
            // Taking the lock orders this wakeup after any waiter's idle check
            let _lock = self.counters.idle_lock.lock();
            self.counters.idle.notify_all();
        }
    }
}

/// A rayon thread pool instrumented as a dispatcher.
///
/// # Example
///
/// ```ignore
/// let pool = Arc::new(MonitoredPool::new("workers", DispatcherKind::ThreadPoolExecutor, 4)?);
/// meter.register_dispatcher("workers", pool.clone())?;
///
/// pool.spawn(|| expensive_work())?;
/// ```
pub struct MonitoredPool {
    name: Arc<str>,
    kind: DispatcherKind,
    threads: usize,
    pool: RwLock<Option<rayon::ThreadPool>>,
    counters: Arc<TaskCounters>,
}

impl MonitoredPool {
    /// Build a pool with `threads` workers. Zero lets rayon choose.
    pub fn new(name: impl Into<Arc<str>>, kind: DispatcherKind, threads: usize) -> Result<Self> {
        let name: Arc<str> = name.into();
        let thread_prefix = Arc::clone(&name);
        let start_name = Arc::clone(&name);
        let panic_name = Arc::clone(&name);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{}-{:04}", thread_prefix, i))
            .start_handler(move |thread_index| {
                debug!(thread_index, dispatcher = %start_name, "dispatcher thread starting");
            })
            .panic_handler(move |_| {
                warn!(dispatcher = %panic_name, "dispatcher task panicked");
            })
            .build()?;

        let threads = pool.current_num_threads();
        info!(dispatcher = %name, ?kind, threads, "built monitored pool");

        Ok(Self {
            name,
            kind,
            threads,
            pool: RwLock::new(Some(pool)),
            counters: Arc::new(TaskCounters::new()),
        })
    }

    /// Queue `f` on the pool.
    ///
    /// # Errors
    ///
    /// Returns [`MeterError::DispatcherShutdown`] once the pool was shut down.
    pub fn spawn<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let pool = self.pool.read();
        let Some(pool) = pool.as_ref() else {
            return Err(MeterError::DispatcherShutdown {
                name: self.name.to_string(),
            });
        };

        self.counters.submitted.fetch_add(1, Ordering::AcqRel);
        let counters = Arc::clone(&self.counters);
        pool.spawn(move || {
            let _guard = TaskGuard::start(counters);
            f();
        });
        Ok(())
    }

    /// Block until every submitted task completed, or `timeout` elapsed.
    ///
    /// Returns whether the pool is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut lock = self.counters.idle_lock.lock();
        while !self.counters.is_idle() {
            if self.counters.idle.wait_until(&mut lock, deadline).timed_out() {
                return self.counters.is_idle();
            }
        }
        true
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks submitted since the pool was built.
    pub fn submitted_tasks(&self) -> u64 {
        self.counters.submitted.load(Ordering::Relaxed)
    }
}

impl DispatcherSensor for MonitoredPool {
    fn kind(&self) -> DispatcherKind {
        self.kind
    }

    fn parallelism(&self) -> i64 {
        self.threads as i64
    }

    fn pool_size(&self) -> i64 {
        self.pool
            .read()
            .as_ref()
            .map_or(0, |p| p.current_num_threads() as i64)
    }

    fn active_threads(&self) -> i64 {
        let started = self.counters.started.load(Ordering::Acquire);
        let completed = self.counters.completed.load(Ordering::Acquire);
        started.saturating_sub(completed) as i64
    }

    fn queued_task_count(&self) -> i64 {
        let submitted = self.counters.submitted.load(Ordering::Acquire);
        let started = self.counters.started.load(Ordering::Acquire);
        submitted.saturating_sub(started) as i64
    }

    fn processed_tasks(&self) -> i64 {
        self.counters.completed.load(Ordering::Acquire) as i64
    }

    fn is_terminated(&self) -> bool {
        self.pool.read().is_none()
    }

    /// Stop accepting work. Queued tasks still run before the threads exit.
    fn shutdown(&self) {
        if self.pool.write().take().is_some() {
            info!(
                dispatcher = %self.name,
                processed = self.counters.completed.load(Ordering::Relaxed),
                "monitored pool shut down"
            );
        }
    }
}

impl std::fmt::Debug for MonitoredPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoredPool")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("threads", &self.threads)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
