//! Cancellable periodic timer driving the refresh and collection paths.
//!
//! Each tick hands the job to tokio's blocking pool and waits for it, so a slow
//! job delays only its own ticker and never parks an async worker. Ticks that
//! fall due while a job is still running are skipped rather than queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A periodic job running on a tokio runtime until cancelled or dropped.
pub struct Ticker {
    name: Arc<str>,
    period: Duration,
    token: CancellationToken,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl Ticker {
    /// Run `job` every `period` on `runtime`, starting one period from now.
    pub fn spawn<F>(runtime: &Handle, name: impl Into<Arc<str>>, period: Duration, job: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let name: Arc<str> = name.into();
        let token = CancellationToken::new();
        let ticks = Arc::new(AtomicU64::new(0));
        let job = Arc::new(job);

        let task = {
            let name = Arc::clone(&name);
            let token = token.clone();
            let ticks = Arc::clone(&ticks);
            runtime.spawn(async move {
                let mut interval = interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                debug!(ticker = %name, ?period, "ticker started");

                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = interval.tick() => {
                            let job = Arc::clone(&job);
                            if let Err(e) = tokio::task::spawn_blocking(move || job()).await {
                                warn!(ticker = %name, error = %e, "ticker job failed");
                            }
                            ticks.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }

                debug!(ticker = %name, ticks = ticks.load(Ordering::Relaxed), "ticker stopped");
            })
        };

        Self {
            name,
            period,
            token,
            ticks,
            task,
        }
    }

    /// Stop the ticker. A job already running finishes; no new tick fires.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the ticker's task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("ticks", &self.ticks())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_ticker_runs_until_cancelled() {
        let rt = runtime();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let ticker = Ticker::spawn(rt.handle(), "test", Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::Relaxed);
        });

        thread::sleep(Duration::from_millis(150));
        assert!(count.load(Ordering::Relaxed) >= 2);

        ticker.cancel();
        assert!(ticker.is_cancelled());
        thread::sleep(Duration::from_millis(50));
        let stopped_at = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), stopped_at);
        assert!(ticker.is_finished());
        assert_eq!(ticker.ticks(), stopped_at);
    }

    #[test]
    fn test_first_tick_waits_one_period() {
        let rt = runtime();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let _ticker = Ticker::spawn(rt.handle(), "slow", Duration::from_secs(60), move || {
            c.fetch_add(1, Ordering::Relaxed);
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_drop_cancels() {
        let rt = runtime();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let ticker = Ticker::spawn(rt.handle(), "dropped", Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(ticker.name(), "dropped");
        assert_eq!(ticker.period(), Duration::from_millis(5));
        drop(ticker);

        thread::sleep(Duration::from_millis(50));
        let after_drop = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), after_drop);
    }

    #[test]
    fn test_panicking_job_keeps_ticking() {
        let rt = runtime();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let ticker = Ticker::spawn(rt.handle(), "panicky", Duration::from_millis(10), move || {
            if c.fetch_add(1, Ordering::Relaxed) == 0 {
                panic!("first tick fails");
            }
        });

        thread::sleep(Duration::from_millis(150));
        assert!(count.load(Ordering::Relaxed) >= 2);
        assert!(ticker.ticks() >= 2);
    }
}
