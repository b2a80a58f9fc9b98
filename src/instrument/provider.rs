//! Value providers backing gauges.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Failure reported by a [`ValueProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider could not read its source.
    #[error("provider failed: {0}")]
    Failed(String),

    /// The provider panicked during the read.
    #[error("provider panicked: {0}")]
    Panicked(String),

    /// The source is gone (e.g. the pool was shut down).
    #[error("provider source unavailable")]
    Unavailable,
}

/// Zero-argument source of a gauge value.
///
/// Invoked only from [`Gauge::refresh`](super::Gauge::refresh), never from the
/// update path. Plain `Fn() -> i64` closures are providers.
pub trait ValueProvider: Send + Sync {
    /// Read the current value.
    fn current_value(&self) -> Result<i64, ProviderError>;
}

impl<F> ValueProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    #[inline]
    fn current_value(&self) -> Result<i64, ProviderError> {
        Ok(self())
    }
}

/// Adapter turning a `Fn() -> Result<i64, ProviderError>` closure into a provider.
pub struct Fallible<F>(pub F);

impl<F> ValueProvider for Fallible<F>
where
    F: Fn() -> Result<i64, ProviderError> + Send + Sync,
{
    #[inline]
    fn current_value(&self) -> Result<i64, ProviderError> {
        (self.0)()
    }
}

/// Turns a monotonically increasing source into per-read deltas.
///
/// Each read returns how much the source grew since the previous read, so a
/// gauge backed by it reports the amount of work done in each refresh window.
/// The first read reports the full value since zero. A source that moves
/// backwards reports 0 for that read.
pub struct DifferentialProvider<P> {
    source: P,
    last: AtomicI64,
}

impl<P: ValueProvider> DifferentialProvider<P> {
    /// Wrap a cumulative source.
    pub fn new(source: P) -> Self {
        Self {
            source,
            last: AtomicI64::new(0),
        }
    }
}

impl<P: ValueProvider> ValueProvider for DifferentialProvider<P> {
    fn current_value(&self) -> Result<i64, ProviderError> {
        let current = self.source.current_value()?;
        let previous = self.last.swap(current, Ordering::AcqRel);
        Ok(current.saturating_sub(previous).max(0))
    }
}

/// Named value providers handed to the registry alongside the descriptors.
#[derive(Clone, Default)]
pub struct Providers {
    by_name: HashMap<String, Arc<dyn ValueProvider>>,
}

impl Providers {
    /// Create an empty provider set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider for the gauge called `name`.
    pub fn with(mut self, name: impl Into<String>, provider: impl ValueProvider + 'static) -> Self {
        self.by_name.insert(name.into(), Arc::new(provider));
        self
    }

    /// Add a fallible closure as the provider for `name`.
    pub fn with_fallible<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Result<i64, ProviderError> + Send + Sync + 'static,
    {
        self.with(name, Fallible(f))
    }

    /// Add a shared provider for `name`.
    pub fn insert_shared(&mut self, name: impl Into<String>, provider: Arc<dyn ValueProvider>) {
        self.by_name.insert(name.into(), provider);
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<dyn ValueProvider>> {
        self.by_name.get(name).cloned()
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Providers").field("names", &names).finish()
    }
}
