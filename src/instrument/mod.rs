//! Instruments owned by an entity recorder.
//!
//! Two kinds exist:
//!
//! - [`Gauge`] - pulls its value from a [`ValueProvider`] when refreshed and
//!   summarizes every refresh (min/max/sum/count) until the next collect.
//! - [`MinMaxCounter`] - updated directly by worker threads, tracking its
//!   current value and the extremes it reached since the last collect.
//!
//! # Performance
//!
//! | Operation | Cost |
//! |-----------|------|
//! | `MinMaxCounter::increment` / `decrement` / `set` | 3 atomic ops, never blocks |
//! | `Gauge::refresh` | provider call + one short uncontended lock |
//! | `collect` (either kind) | one short lock or 3 atomic swaps |

use std::borrow::Cow;

mod gauge;
mod min_max_counter;
mod provider;

pub use gauge::{Gauge, GaugeSummary};
pub use min_max_counter::{MinMaxCounter, MinMaxSummary};
pub use provider::{DifferentialProvider, Fallible, ProviderError, Providers, ValueProvider};

/// Kind of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Gauge,
    MinMaxCounter,
}

/// Static declaration of one instrument of a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentDescriptor {
    pub name: Cow<'static, str>,
    pub kind: InstrumentKind,
}

impl InstrumentDescriptor {
    /// Declare a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            kind: InstrumentKind::Gauge,
        }
    }

    /// Declare a min/max counter.
    pub const fn min_max_counter(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            kind: InstrumentKind::MinMaxCounter,
        }
    }

    /// Declare an instrument with a runtime-built name.
    pub fn new(name: impl Into<String>, kind: InstrumentKind) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            kind,
        }
    }
}

/// A live instrument.
#[derive(Debug)]
pub enum Instrument {
    Gauge(Gauge),
    MinMaxCounter(MinMaxCounter),
}

impl Instrument {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            Instrument::Gauge(_) => InstrumentKind::Gauge,
            Instrument::MinMaxCounter(_) => InstrumentKind::MinMaxCounter,
        }
    }

    /// Summarize the instrument for a snapshot and start a new window.
    pub(crate) fn collect(&self) -> InstrumentSummary {
        match self {
            Instrument::Gauge(g) => InstrumentSummary::Gauge(g.take_summary()),
            Instrument::MinMaxCounter(c) => InstrumentSummary::MinMaxCounter(c.collect_and_reset()),
        }
    }
}

/// Per-window readout of one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentSummary {
    Gauge(GaugeSummary),
    MinMaxCounter(MinMaxSummary),
}

impl InstrumentSummary {
    pub fn min(&self) -> i64 {
        match self {
            InstrumentSummary::Gauge(s) => s.min,
            InstrumentSummary::MinMaxCounter(s) => s.min,
        }
    }

    pub fn max(&self) -> i64 {
        match self {
            InstrumentSummary::Gauge(s) => s.max,
            InstrumentSummary::MinMaxCounter(s) => s.max,
        }
    }

    pub fn as_gauge(&self) -> Option<&GaugeSummary> {
        match self {
            InstrumentSummary::Gauge(s) => Some(s),
            InstrumentSummary::MinMaxCounter(_) => None,
        }
    }

    pub fn as_min_max_counter(&self) -> Option<&MinMaxSummary> {
        match self {
            InstrumentSummary::MinMaxCounter(s) => Some(s),
            InstrumentSummary::Gauge(_) => None,
        }
    }
}
