//! Min/max counters: directly updated values with per-window extremes.

use std::sync::atomic::{AtomicI64, Ordering};

/// Extremes and current value of a [`MinMaxCounter`] for one window.
///
/// Always satisfies `min <= current <= max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinMaxSummary {
    pub min: i64,
    pub max: i64,
    pub current: i64,
}

/// Counter that moves up and down while tracking its min and max since the
/// last collect.
///
/// Every update is a handful of atomic operations and never blocks. Extremes
/// are published after the value itself and collection is not a single atomic
/// transition, so an extreme reached while a collect is in progress is
/// attributed to that window or to the next one. It is never dropped.
#[derive(Debug)]
pub struct MinMaxCounter {
    current: AtomicI64,
    min: AtomicI64,
    max: AtomicI64,
}

impl Default for MinMaxCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

impl MinMaxCounter {
    /// Create a counter starting at `initial`.
    pub fn new(initial: i64) -> Self {
        Self {
            current: AtomicI64::new(initial),
            min: AtomicI64::new(initial),
            max: AtomicI64::new(initial),
        }
    }

    /// Add `delta` to the current value.
    #[inline]
    pub fn increment(&self, delta: i64) {
        let value = self
            .current
            .fetch_add(delta, Ordering::AcqRel)
            .wrapping_add(delta);
        self.observe(value);
    }

    /// Subtract `delta` from the current value.
    #[inline]
    pub fn decrement(&self, delta: i64) {
        let value = self
            .current
            .fetch_sub(delta, Ordering::AcqRel)
            .wrapping_sub(delta);
        self.observe(value);
    }

    /// Replace the current value.
    #[inline]
    pub fn set(&self, value: i64) {
        self.current.store(value, Ordering::Release);
        self.observe(value);
    }

    /// The current value.
    #[inline]
    pub fn current(&self) -> i64 {
        self.current.load(Ordering::Acquire)
    }

    #[inline]
    fn observe(&self, value: i64) {
        self.min.fetch_min(value, Ordering::AcqRel);
        self.max.fetch_max(value, Ordering::AcqRel);
    }

    /// Capture min, max and current, then reset min and max to the captured
    /// current value. The current value itself is left alone.
    ///
    /// The three reads are separate atomics. An update racing with them lands
    /// its extreme either in the returned summary or in the next window's.
    pub fn collect_and_reset(&self) -> MinMaxSummary {
        let current = self.current.load(Ordering::Acquire);
        let min = self.min.swap(current, Ordering::AcqRel);
        let max = self.max.swap(current, Ordering::AcqRel);
        // The captured value may be newer than the extremes published so far.
        MinMaxSummary {
            min: min.min(current),
            max: max.max(current),
            current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_sequence() {
        let counter = MinMaxCounter::default();
        counter.set(5);
        counter.set(2);
        counter.set(9);

        assert_eq!(
            counter.collect_and_reset(),
            MinMaxSummary {
                min: 0,
                max: 9,
                current: 9
            }
        );
        assert_eq!(
            counter.collect_and_reset(),
            MinMaxSummary {
                min: 9,
                max: 9,
                current: 9
            }
        );
    }

    #[test]
    fn test_increment_range() {
        let counter = MinMaxCounter::new(0);
        for _ in 0..10 {
            counter.increment(1);
        }
        let s = counter.collect_and_reset();
        assert_eq!(s.max - s.min, 10);
        assert_eq!(s.current, 10);

        // No movement since the last collect
        let s = counter.collect_and_reset();
        assert_eq!((s.min, s.max, s.current), (10, 10, 10));
    }

    #[test]
    fn test_decrement_below_start() {
        let counter = MinMaxCounter::new(2);
        counter.decrement(5);
        counter.increment(1);
        let s = counter.collect_and_reset();
        assert_eq!((s.min, s.max, s.current), (-3, 2, -2));
    }

    #[test]
    fn test_initial_value() {
        let counter = MinMaxCounter::new(8);
        assert_eq!(counter.current(), 8);
        assert_eq!(
            counter.collect_and_reset(),
            MinMaxSummary {
                min: 8,
                max: 8,
                current: 8
            }
        );
    }

    #[test]
    fn test_racing_peak_is_attributed_to_some_window() {
        const PEAK: i64 = 500;
        let counter = Arc::new(MinMaxCounter::default());

        let writer = {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    for _ in 0..PEAK {
                        counter.increment(1);
                    }
                    for _ in 0..PEAK {
                        counter.decrement(1);
                    }
                }
            })
        };

        let mut windows = Vec::new();
        while !writer.is_finished() {
            windows.push(counter.collect_and_reset());
        }
        writer.join().unwrap();
        windows.push(counter.collect_and_reset());

        for s in &windows {
            assert!(s.min >= 0 && s.max <= PEAK, "{:?}", s);
        }
        assert_eq!(windows.iter().map(|s| s.max).max(), Some(PEAK));
        assert_eq!(windows.iter().map(|s| s.min).min(), Some(0));
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_concurrent_net_delta() {
        let counter = Arc::new(MinMaxCounter::default());
        let mut handles = vec![];

        for t in 0..8 {
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                for i in 0..10_000 {
                    if (i + t) % 3 == 0 {
                        counter.decrement(1);
                    } else {
                        counter.increment(2);
                    }
                }
            }));
        }

        // Collect concurrently with the writers
        let collector = {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    let s = counter.collect_and_reset();
                    assert!(s.min <= s.current && s.current <= s.max);
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        collector.join().unwrap();

        let expected: i64 = (0..8)
            .map(|t| {
                (0..10_000)
                    .map(|i| if (i + t) % 3 == 0 { -1 } else { 2 })
                    .sum::<i64>()
            })
            .sum();
        assert_eq!(counter.current(), expected);

        let s = counter.collect_and_reset();
        assert!(s.min <= s.max);
        assert_eq!(s.current, expected);
    }
}
