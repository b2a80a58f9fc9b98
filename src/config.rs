//! Configuration types for the meter.

use std::collections::BTreeMap;
use std::time::Duration;

use prometheus::Registry;
use serde::{Deserialize, Serialize};

use crate::error::{MeterError, Result};

/// Default collection tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Default gauge refresh interval.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a [`Meter`](crate::Meter).
///
/// This struct can be deserialized from TOML, YAML, JSON, or environment variables
/// using figment. Durations are written in humantime form (`"10s"`, `"250ms"`).
///
/// ```toml
/// prefix = "myapp"
/// tick_interval = "10s"
/// refresh_interval = "100ms"
///
/// [filters.dispatcher]
/// includes = ["*"]
/// excludes = ["internal-*"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeterConfig {
    /// Prefix for the meter's own prometheus metrics (default: "meter")
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// How often every live recorder is collected into a snapshot (default: 10s)
    #[serde(default = "default_tick_interval", with = "duration_format")]
    pub tick_interval: Duration,

    /// How often every gauge pulls a fresh value from its provider (default: 100ms)
    #[serde(default = "default_refresh_interval", with = "duration_format")]
    pub refresh_interval: Duration,

    /// Include/exclude rules keyed by entity category.
    /// Categories without a rule are never recorded.
    #[serde(default)]
    pub filters: BTreeMap<String, FilterConfig>,

    /// Prometheus registry for the meter's self-metrics.
    /// Not serializable - must be set programmatically.
    #[serde(skip)]
    pub prometheus_registry: Option<Registry>,
}

/// Include/exclude glob patterns for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Entity names to record. Empty means every name (`"*"`).
    #[serde(default)]
    pub includes: Vec<String>,

    /// Entity names never to record. Wins over `includes`.
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl FilterConfig {
    /// Create a rule from include and exclude patterns.
    pub fn new<I, E, S>(includes: I, excludes: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            includes: includes.into_iter().map(Into::into).collect(),
            excludes: excludes.into_iter().map(Into::into).collect(),
        }
    }

    /// A rule accepting every entity of the category.
    pub fn accept_all() -> Self {
        Self::new(["*"], [] as [&str; 0])
    }
}

fn default_prefix() -> String {
    "meter".to_string()
}

fn default_tick_interval() -> Duration {
    DEFAULT_TICK_INTERVAL
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            tick_interval: default_tick_interval(),
            refresh_interval: default_refresh_interval(),
            filters: BTreeMap::new(),
            prometheus_registry: None,
        }
    }
}

impl MeterConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the filter rule for a category.
    pub fn with_filter(mut self, category: impl Into<String>, rule: FilterConfig) -> Self {
        self.filters.insert(category.into(), rule);
        self
    }

    /// Check that both intervals can drive a ticker.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(MeterError::InvalidInterval {
                name: "tick_interval",
            });
        }
        if self.refresh_interval.is_zero() {
            return Err(MeterError::InvalidInterval {
                name: "refresh_interval",
            });
        }
        Ok(())
    }
}

/// Humantime (de)serialization for `Duration` fields.
pub(crate) mod duration_format {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(s.trim()).map_err(|e| {
            serde::de::Error::custom(format!("invalid duration '{}': {}", s, e))
        })
    }
}
