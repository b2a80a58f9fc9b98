//! Snapshots and the context they are collected with.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::instrument::InstrumentSummary;
use crate::recorder::EntityKey;

type Values = Vec<(Arc<str>, InstrumentSummary)>;

/// Immutable readout of every instrument of one entity for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    key: EntityKey,
    taken_at: SystemTime,
    /// Sorted by instrument name.
    values: Values,
}

impl Snapshot {
    /// `values` must already be sorted by instrument name.
    pub(crate) fn new(key: EntityKey, values: Values) -> Self {
        debug_assert!(values.windows(2).all(|w| w[0].0 < w[1].0));
        Self {
            key,
            taken_at: SystemTime::now(),
            values,
        }
    }

    /// The entity this snapshot belongs to.
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Wall-clock time the snapshot was assembled.
    pub fn taken_at(&self) -> SystemTime {
        self.taken_at
    }

    /// Summary of the instrument called `name`.
    pub fn get(&self, name: &str) -> Option<&InstrumentSummary> {
        self.values
            .binary_search_by(|(n, _)| n.as_ref().cmp(name))
            .ok()
            .map(|i| &self.values[i].1)
    }

    /// All summaries in instrument-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InstrumentSummary)> {
        self.values.iter().map(|(n, s)| (n.as_ref(), s))
    }

    /// Number of instruments in the snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Collection state carried from one cycle to the next.
///
/// Every snapshot owns its value buffer. Snapshots handed back through
/// [`recycle`](Self::recycle) donate their buffer to the next `collect`, so a
/// caller that recycles each batch once it is done with it collects without
/// allocating. Nothing in the context affects what a snapshot contains.
///
/// ```ignore
/// let mut ctx = CollectionContext::new();
/// loop {
///     let batch = meter.collect_all(&mut ctx);
///     export(&batch);
///     ctx.recycle_all(batch.snapshots);
/// }
/// ```
#[derive(Debug)]
pub struct CollectionContext {
    /// Never grows past its initial capacity.
    spare: Vec<Values>,
    started_at: Instant,
    snapshots: usize,
}

impl Default for CollectionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionContext {
    pub fn new() -> Self {
        Self::with_capacity(16)
    }

    /// Keep up to `snapshots` recycled buffers.
    pub fn with_capacity(snapshots: usize) -> Self {
        Self {
            spare: Vec::with_capacity(snapshots),
            started_at: Instant::now(),
            snapshots: 0,
        }
    }

    /// Start a new collection cycle.
    pub fn begin_cycle(&mut self) {
        self.started_at = Instant::now();
        self.snapshots = 0;
    }

    /// When the current cycle began.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Snapshots taken with this context in the current cycle.
    pub fn snapshots_taken(&self) -> usize {
        self.snapshots
    }

    /// Recycled buffers waiting for reuse.
    pub fn spare_buffers(&self) -> usize {
        self.spare.len()
    }

    /// Hand a snapshot's buffer back for the next `collect`.
    ///
    /// Dropped instead when the context already holds as many buffers as it
    /// was sized for.
    pub fn recycle(&mut self, snapshot: Snapshot) {
        if self.spare.len() < self.spare.capacity() {
            let mut values = snapshot.values;
            values.clear();
            self.spare.push(values);
        }
    }

    /// Recycle every snapshot of a batch.
    pub fn recycle_all(&mut self, snapshots: impl IntoIterator<Item = Snapshot>) {
        for snapshot in snapshots {
            self.recycle(snapshot);
        }
    }

    /// An empty buffer able to hold `len` values, reused when one is spare.
    pub(crate) fn buffer(&mut self, len: usize) -> Values {
        match self.spare.iter().position(|b| b.capacity() >= len) {
            Some(i) => self.spare.swap_remove(i),
            None => Vec::with_capacity(len),
        }
    }

    /// Wrap name-sorted values into a snapshot of `key`.
    pub(crate) fn finish(&mut self, key: EntityKey, values: Values) -> Snapshot {
        self.snapshots += 1;
        Snapshot::new(key, values)
    }
}
