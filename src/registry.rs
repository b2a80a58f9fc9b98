//! Process-wide registry of entity recorders.
//!
//! # Architecture
//!
//! ```text
//! EntityRegistry
//!   ├── EntityFilter (consulted before a recorder is built)
//!   └── RwLock<HashMap<category, HashMap<name, Arc<EntityRecorder>>>>
//! ```
//!
//! Lookups take the read lock only. Registration re-checks under the write
//! lock, so concurrent registrations of the same key agree on one recorder.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::filter::EntityFilter;
use crate::instrument::{InstrumentDescriptor, Providers};
use crate::metrics::MeterMetrics;
use crate::recorder::{EntityKey, EntityRecorder};

type CategoryMap = HashMap<Arc<str>, HashMap<Arc<str>, Arc<EntityRecorder>>>;

/// Map from (category, entity name) to the entity's recorder.
pub struct EntityRegistry {
    entities: RwLock<CategoryMap>,
    filter: EntityFilter,
    metrics: MeterMetrics,
}

impl EntityRegistry {
    /// Create a registry gated by `filter`.
    pub fn new(filter: EntityFilter) -> Self {
        Self::with_metrics(filter, MeterMetrics::new())
    }

    /// Create a registry reporting into `metrics`.
    pub fn with_metrics(filter: EntityFilter, metrics: MeterMetrics) -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            filter,
            metrics,
        }
    }

    /// Look up a recorder. Never creates one.
    pub fn find(&self, category: &str, name: &str) -> Option<Arc<EntityRecorder>> {
        self.entities
            .read()
            .get(category)
            .and_then(|names| names.get(name))
            .cloned()
    }

    /// Return the recorder for the entity, creating it if the filter accepts it.
    ///
    /// An already registered entity gets its existing recorder back and
    /// `providers` is ignored. A rejected entity returns `Ok(None)` without
    /// building anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a gauge descriptor has no provider or two
    /// descriptors share a name. Nothing is registered in that case.
    pub fn register(
        &self,
        category: &str,
        name: &str,
        descriptors: &[InstrumentDescriptor],
        providers: &Providers,
    ) -> Result<Option<Arc<EntityRecorder>>> {
        // Fast path: read lock
        if let Some(existing) = self.find(category, name) {
            return Ok(Some(existing));
        }

        if !self.filter.accepts(category, name) {
            debug!(%category, %name, "entity rejected by filter");
            self.metrics.rejected_entities.inc();
            return Ok(None);
        }

        // Slow path: write lock, double-check, build
        let mut entities = self.entities.write();
        if let Some(existing) = entities.get(category).and_then(|names| names.get(name)) {
            return Ok(Some(Arc::clone(existing)));
        }

        let key = EntityKey::new(category, name);
        let recorder = Arc::new(EntityRecorder::build(key, descriptors, providers)?);
        entities
            .entry(Arc::from(category))
            .or_default()
            .insert(Arc::from(name), Arc::clone(&recorder));
        // Set under the lock so concurrent updates land in order
        self.metrics.live_entities.set(live_count(&entities) as i64);
        drop(entities);

        self.metrics.registered_entities.inc();
        debug!(%category, %name, instruments = descriptors.len(), "entity registered");
        Ok(Some(recorder))
    }

    /// Remove the entity's recorder. Returns whether one was removed.
    ///
    /// Holders of the removed recorder keep a valid handle, but it is no
    /// longer reachable through the registry.
    pub fn remove(&self, category: &str, name: &str) -> bool {
        let mut entities = self.entities.write();
        let Some(names) = entities.get_mut(category) else {
            return false;
        };
        if names.remove(name).is_none() {
            return false;
        }
        if names.is_empty() {
            entities.remove(category);
        }
        self.metrics.live_entities.set(live_count(&entities) as i64);
        drop(entities);

        self.metrics.removed_entities.inc();
        debug!(%category, %name, "entity removed");
        true
    }

    /// Point-in-time list of every live recorder.
    pub fn recorders(&self) -> Vec<Arc<EntityRecorder>> {
        self.entities
            .read()
            .values()
            .flat_map(|names| names.values().cloned())
            .collect()
    }

    /// Number of live recorders.
    pub fn len(&self) -> usize {
        live_count(&self.entities.read())
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Drop every recorder.
    pub fn clear(&self) {
        let mut entities = self.entities.write();
        entities.clear();
        self.metrics.live_entities.set(0);
    }

    /// The filter gating registration.
    pub fn filter(&self) -> &EntityFilter {
        &self.filter
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("live_entities", &self.len())
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

fn live_count(entities: &CategoryMap) -> usize {
    entities.values().map(HashMap::len).sum()
}
