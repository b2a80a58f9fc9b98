//! Gauges: values pulled from an external provider and summarized per window.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use super::provider::{ProviderError, ValueProvider};

/// Summary of the values a gauge observed since the last collect.
///
/// An empty window (no successful refresh) reports zeros with `count == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GaugeSummary {
    pub min: i64,
    pub max: i64,
    pub sum: i64,
    pub count: u64,
}

impl GaugeSummary {
    fn record(&mut self, value: i64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum = self.sum.saturating_add(value);
        self.count += 1;
    }

    /// Whether no value was recorded in the window.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean of the recorded values, if any.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

#[derive(Debug, Default)]
struct GaugeState {
    current: i64,
    window: GaugeSummary,
}

/// Instrument whose value is pulled from a [`ValueProvider`] on [`refresh`](Self::refresh).
///
/// Refresh is the only mutation path. The provider is invoked outside the state
/// lock, and the new value is folded into the summary under it, so readers see
/// either the previous or the new summary in full.
pub struct Gauge {
    provider: Arc<dyn ValueProvider>,
    state: Mutex<GaugeState>,
}

impl Gauge {
    /// Create a gauge bound to `provider`.
    pub fn new(provider: Arc<dyn ValueProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(GaugeState::default()),
        }
    }

    /// Pull a fresh value from the provider and fold it into the summary.
    ///
    /// A provider that errors or panics leaves the gauge untouched.
    pub fn refresh(&self) -> Result<i64, ProviderError> {
        let provider = &self.provider;
        let value = catch_unwind(AssertUnwindSafe(|| provider.current_value()))
            .map_err(|payload| ProviderError::Panicked(panic_message(payload.as_ref())))??;

        let mut state = self.state.lock();
        state.current = value;
        state.window.record(value);
        Ok(value)
    }

    /// Value of the last successful refresh (0 before the first one).
    pub fn current(&self) -> i64 {
        self.state.lock().current
    }

    /// Summary of the current window. Does not reset it.
    pub fn current_summary(&self) -> GaugeSummary {
        self.state.lock().window
    }

    /// Capture the current window and start an empty one.
    pub(crate) fn take_summary(&self) -> GaugeSummary {
        std::mem::take(&mut self.state.lock().window)
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Gauge")
            .field("current", &state.current)
            .field("window", &state.window)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::provider::Fallible;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

    fn gauge_over(source: &Arc<AtomicI64>) -> Gauge {
        let s = source.clone();
        Gauge::new(Arc::new(move || s.load(Ordering::Relaxed)))
    }

    #[test]
    fn test_empty_summary() {
        let source = Arc::new(AtomicI64::new(3));
        let gauge = gauge_over(&source);
        let summary = gauge.current_summary();
        assert!(summary.is_empty());
        assert_eq!(summary, GaugeSummary::default());
        assert_eq!(summary.mean(), None);
        assert_eq!(gauge.current(), 0);
    }

    #[test]
    fn test_refresh_folds_into_summary() {
        let source = Arc::new(AtomicI64::new(0));
        let gauge = gauge_over(&source);

        for v in [4, 1, 7] {
            source.store(v, Ordering::Relaxed);
            assert_eq!(gauge.refresh(), Ok(v));
        }

        let summary = gauge.current_summary();
        assert_eq!(
            summary,
            GaugeSummary {
                min: 1,
                max: 7,
                sum: 12,
                count: 3
            }
        );
        assert_eq!(summary.mean(), Some(4.0));
        assert_eq!(gauge.current(), 7);
    }

    #[test]
    fn test_current_summary_does_not_reset() {
        let source = Arc::new(AtomicI64::new(5));
        let gauge = gauge_over(&source);
        gauge.refresh().unwrap();
        assert_eq!(gauge.current_summary().count, 1);
        assert_eq!(gauge.current_summary().count, 1);
    }

    #[test]
    fn test_take_summary_starts_new_window() {
        let source = Arc::new(AtomicI64::new(5));
        let gauge = gauge_over(&source);
        gauge.refresh().unwrap();

        let taken = gauge.take_summary();
        assert_eq!(taken.max, 5);
        assert_eq!(taken.count, 1);

        assert!(gauge.current_summary().is_empty());
        // Current value survives the reset
        assert_eq!(gauge.current(), 5);
    }

    #[test]
    fn test_failing_provider_keeps_last_summary() {
        let fail = Arc::new(AtomicBool::new(false));
        let f = fail.clone();
        let gauge = Gauge::new(Arc::new(Fallible(move || {
            if f.load(Ordering::Relaxed) {
                Err(ProviderError::Unavailable)
            } else {
                Ok(9i64)
            }
        })));

        gauge.refresh().unwrap();
        fail.store(true, Ordering::Relaxed);
        assert_eq!(gauge.refresh(), Err(ProviderError::Unavailable));

        let summary = gauge.current_summary();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.max, 9);
        assert_eq!(gauge.current(), 9);
    }

    #[test]
    fn test_panicking_provider_is_contained() {
        let gauge = Gauge::new(Arc::new(|| -> i64 { panic!("pool gone") }));
        match gauge.refresh() {
            Err(ProviderError::Panicked(msg)) => assert_eq!(msg, "pool gone"),
            other => panic!("expected panic error, got {:?}", other),
        }
        assert!(gauge.current_summary().is_empty());
    }

    #[test]
    fn test_concurrent_refresh_and_read() {
        use std::thread;

        let source = Arc::new(AtomicI64::new(0));
        let gauge = Arc::new(gauge_over(&source));

        let writer = {
            let gauge = gauge.clone();
            let source = source.clone();
            thread::spawn(move || {
                for v in 1..=1000 {
                    source.store(v, Ordering::Relaxed);
                    gauge.refresh().unwrap();
                }
            })
        };

        for _ in 0..1000 {
            let s = gauge.current_summary();
            if s.count > 0 {
                assert!(s.min <= s.max);
                assert!(s.sum >= s.max);
            }
        }
        writer.join().unwrap();

        let s = gauge.current_summary();
        assert_eq!(s.count, 1000);
        assert_eq!(s.min, 1);
        assert_eq!(s.max, 1000);
        assert_eq!(s.sum, 500_500);
    }
}
