//! Entity recorders: the fixed set of instruments of one monitored entity.

use std::collections::HashSet;
use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;

use tracing::warn;

use crate::error::{MeterError, Result};
use crate::instrument::{
    Gauge, Instrument, InstrumentDescriptor, InstrumentKind, MinMaxCounter, Providers,
};
use crate::snapshot::{CollectionContext, Snapshot};

/// Identity of a monitored entity: its category and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    category: Arc<str>,
    name: Arc<str>,
}

impl EntityKey {
    pub fn new(category: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

/// Outcome of refreshing a set of gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Gauges that pulled a new value.
    pub refreshed: usize,
    /// Gauges whose provider failed; they kept their previous summary.
    pub failed: usize,
}

impl AddAssign for RefreshReport {
    fn add_assign(&mut self, other: Self) {
        self.refreshed += other.refreshed;
        self.failed += other.failed;
    }
}

/// Owns the instruments of one entity.
///
/// The instrument set is fixed at construction. Recorders are created by the
/// [`EntityRegistry`](crate::EntityRegistry) and shared as `Arc<EntityRecorder>`.
pub struct EntityRecorder {
    key: EntityKey,
    /// In declaration order.
    instruments: Vec<(Arc<str>, Instrument)>,
    /// Indices into `instruments`, sorted by name.
    by_name: Vec<usize>,
}

impl EntityRecorder {
    /// Build a recorder wiring every gauge descriptor to its provider.
    pub(crate) fn build(
        key: EntityKey,
        descriptors: &[InstrumentDescriptor],
        providers: &Providers,
    ) -> Result<Self> {
        let mut seen = HashSet::with_capacity(descriptors.len());
        let mut instruments: Vec<(Arc<str>, Instrument)> = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let name: &str = &descriptor.name;
            if !seen.insert(name) {
                return Err(MeterError::DuplicateInstrument {
                    category: key.category().to_string(),
                    instrument: name.to_string(),
                });
            }

            let instrument = match descriptor.kind {
                InstrumentKind::Gauge => {
                    let provider =
                        providers
                            .get(name)
                            .ok_or_else(|| MeterError::MissingProvider {
                                category: key.category().to_string(),
                                instrument: name.to_string(),
                            })?;
                    Instrument::Gauge(Gauge::new(provider))
                }
                InstrumentKind::MinMaxCounter => Instrument::MinMaxCounter(MinMaxCounter::default()),
            };
            instruments.push((Arc::from(name), instrument));
        }

        let mut by_name: Vec<usize> = (0..instruments.len()).collect();
        by_name.sort_unstable_by(|&a, &b| instruments[a].0.cmp(&instruments[b].0));

        Ok(Self {
            key,
            instruments,
            by_name,
        })
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Look up an instrument by name.
    pub fn instrument(&self, name: &str) -> Option<&Instrument> {
        self.by_name
            .binary_search_by(|&i| self.instruments[i].0.as_ref().cmp(name))
            .ok()
            .map(|i| &self.instruments[self.by_name[i]].1)
    }

    /// Look up a gauge by name.
    pub fn gauge(&self, name: &str) -> Option<&Gauge> {
        match self.instrument(name)? {
            Instrument::Gauge(g) => Some(g),
            Instrument::MinMaxCounter(_) => None,
        }
    }

    /// Look up a min/max counter by name.
    pub fn min_max_counter(&self, name: &str) -> Option<&MinMaxCounter> {
        match self.instrument(name)? {
            Instrument::MinMaxCounter(c) => Some(c),
            Instrument::Gauge(_) => None,
        }
    }

    /// Instrument names in declaration order.
    pub fn instrument_names(&self) -> impl Iterator<Item = &str> {
        self.instruments.iter().map(|(n, _)| n.as_ref())
    }

    /// Refresh every gauge of the entity.
    ///
    /// A failing provider is logged and counted; the other gauges still refresh.
    pub fn refresh(&self) -> RefreshReport {
        let mut report = RefreshReport::default();
        for (name, instrument) in &self.instruments {
            let Instrument::Gauge(gauge) = instrument else {
                continue;
            };
            match gauge.refresh() {
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    warn!(entity = %self.key, instrument = %name, error = %e, "gauge refresh failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Summarize every instrument into a snapshot and start a new window.
    ///
    /// Gauges are not refreshed here; their summary covers the refreshes made
    /// since the previous collect. Min/max counters are reset to their current
    /// value.
    ///
    /// The snapshot's buffer comes from `ctx` when one was recycled into it.
    pub fn collect(&self, ctx: &mut CollectionContext) -> Snapshot {
        let mut values = ctx.buffer(self.instruments.len());
        values.extend(self.by_name.iter().map(|&i| {
            let (name, instrument) = &self.instruments[i];
            (Arc::clone(name), instrument.collect())
        }));
        ctx.finish(self.key.clone(), values)
    }
}

impl fmt::Debug for EntityRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRecorder")
            .field("key", &self.key)
            .field("instruments", &self.instruments)
            .finish()
    }
}
