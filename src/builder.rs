//! Builder pattern for constructing meters.
//!
//! The builder supports multiple configuration sources using figment:
//! - Default values
//! - Config files (TOML, YAML, JSON)
//! - Environment variables
//! - Programmatic overrides
//! - CLI arguments via clap

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use prometheus::Registry;

use crate::config::{FilterConfig, MeterConfig};
use crate::error::Result;
use crate::meter::Meter;

/// A programmatic change to one category's filter rule.
#[derive(Debug, Clone)]
enum FilterEdit {
    Replace(String, FilterConfig),
    Include(String, String),
    Exclude(String, String),
}

/// Builder for constructing a [`Meter`].
///
/// Configuration sources are merged in the following order (later sources override earlier):
/// 1. Default values
/// 2. Config files (in order added)
/// 3. Environment variables
/// 4. Programmatic overrides
/// 5. CLI arguments
///
/// Filter rules come from config files and programmatic calls only.
/// [`include`](Self::include) and [`exclude`](Self::exclude) add patterns to
/// whatever the files declared; [`filter`](Self::filter) replaces the rule.
///
/// # Examples
///
/// ```ignore
/// use meter_rs::MeterBuilder;
///
/// let meter = MeterBuilder::new()
///     .file("meter.toml")
///     .env_prefix("METER")
///     .tick_interval(Duration::from_secs(5))
///     .include("dispatcher", "*")
///     .exclude("dispatcher", "internal-*")
///     .build()?;
/// ```
pub struct MeterBuilder {
    figment: Figment,
    filters: Vec<FilterEdit>,
    prometheus_registry: Option<Registry>,
}

impl Default for MeterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MeterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeterBuilder")
            .field("figment", &self.figment)
            .field("filters", &self.filters)
            .field(
                "prometheus_registry",
                &self.prometheus_registry.as_ref().map(|_| "<Registry>"),
            )
            .finish()
    }
}

fn humantime_string(d: Duration) -> String {
    humantime::format_duration(d).to_string()
}

impl MeterBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(MeterConfig::default())),
            filters: Vec::new(),
            prometheus_registry: None,
        }
    }

    /// Add a configuration file.
    ///
    /// Supports TOML, YAML, and JSON formats (detected by extension).
    /// Files are merged in the order they are added.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        self.figment = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => self.figment.merge(Yaml::file(path)),
            "json" => self.figment.merge(Json::file(path)),
            // Default to TOML
            _ => self.figment.merge(Toml::file(path)),
        };
        self
    }

    /// Add environment variables with a prefix.
    ///
    /// Environment variables are expected in the format `{PREFIX}_{KEY}`,
    /// e.g., `METER_TICK_INTERVAL=5s`, `METER_REFRESH_INTERVAL=50ms`.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        let prefix = format!("{}_", prefix.trim_end_matches('_'));
        self.figment = self
            .figment
            .merge(Env::prefixed(&prefix).ignore(&["filters"]));
        self
    }

    /// Set the prefix of the meter's own prometheus metrics.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("prefix", prefix.into()));
        self
    }

    /// Set how often live recorders are collected into snapshots.
    ///
    /// Default is 10 seconds.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("tick_interval", humantime_string(interval)));
        self
    }

    /// Set how often gauges pull from their providers.
    ///
    /// Default is 100 milliseconds.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.figment = self.figment.merge(Serialized::default(
            "refresh_interval",
            humantime_string(interval),
        ));
        self
    }

    /// Replace the filter rule of a category.
    pub fn filter(mut self, category: impl Into<String>, rule: FilterConfig) -> Self {
        self.filters
            .push(FilterEdit::Replace(category.into(), rule));
        self
    }

    /// Record entities of `category` whose name matches `pattern`.
    pub fn include(mut self, category: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filters
            .push(FilterEdit::Include(category.into(), pattern.into()));
        self
    }

    /// Never record entities of `category` whose name matches `pattern`.
    pub fn exclude(mut self, category: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filters
            .push(FilterEdit::Exclude(category.into(), pattern.into()));
        self
    }

    /// Provide an external Prometheus registry for the meter's self-metrics.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use prometheus::Registry;
    ///
    /// let registry = Registry::new();
    /// let meter = MeterBuilder::new()
    ///     .prometheus_registry(registry.clone())
    ///     .build()?;
    ///
    /// let metric_families = registry.gather();
    /// ```
    pub fn prometheus_registry(mut self, registry: Registry) -> Self {
        self.prometheus_registry = Some(registry);
        self
    }

    /// Apply CLI argument overrides.
    ///
    /// This method applies any non-None values from the `MeterArgs` struct.
    pub fn with_cli_args(mut self, args: &MeterArgs) -> Self {
        if let Some(ref prefix) = args.meter_prefix {
            self.figment = self
                .figment
                .merge(Serialized::default("prefix", prefix.clone()));
        }
        if let Some(interval) = args.meter_tick_interval {
            self.figment = self.figment.merge(Serialized::default(
                "tick_interval",
                humantime_string(interval.into()),
            ));
        }
        if let Some(interval) = args.meter_refresh_interval {
            self.figment = self.figment.merge(Serialized::default(
                "refresh_interval",
                humantime_string(interval.into()),
            ));
        }
        self
    }

    /// Resolve the layered configuration without building a meter.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration extraction fails.
    pub fn config(&self) -> Result<MeterConfig> {
        let mut config: MeterConfig = self.figment.extract().map_err(Box::new)?;
        for edit in &self.filters {
            match edit {
                FilterEdit::Replace(category, rule) => {
                    config.filters.insert(category.clone(), rule.clone());
                }
                FilterEdit::Include(category, pattern) => config
                    .filters
                    .entry(category.clone())
                    .or_default()
                    .includes
                    .push(pattern.clone()),
                FilterEdit::Exclude(category, pattern) => config
                    .filters
                    .entry(category.clone())
                    .or_default()
                    .excludes
                    .push(pattern.clone()),
            }
        }
        config.prometheus_registry = self.prometheus_registry.clone();
        Ok(config)
    }

    /// Build the meter.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration extraction fails
    /// - Either interval is zero
    pub fn build(self) -> Result<Meter> {
        Meter::new(self.config()?)
    }
}

/// CLI arguments for meter configuration.
///
/// Use with clap's `Parser` derive macro. These arguments can be applied
/// to a `MeterBuilder` using `with_cli_args`.
///
/// # Examples
///
/// ```ignore
/// use clap::Parser;
/// use meter_rs::{MeterArgs, MeterBuilder};
///
/// #[derive(Parser)]
/// struct MyArgs {
///     #[command(flatten)]
///     meter: MeterArgs,
/// }
///
/// let args = MyArgs::parse();
/// let meter = MeterBuilder::new().with_cli_args(&args.meter).build()?;
/// ```
#[derive(Debug, Default, Clone, clap::Args)]
pub struct MeterArgs {
    /// Prefix of the meter's own metrics
    #[arg(long)]
    pub meter_prefix: Option<String>,

    /// Collection tick interval (e.g., "10s")
    #[arg(long)]
    pub meter_tick_interval: Option<humantime::Duration>,

    /// Gauge refresh interval (e.g., "100ms")
    #[arg(long)]
    pub meter_refresh_interval: Option<humantime::Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeterError;
    use std::io::Write;

    #[test]
    fn test_builder_defaults() {
        let config = MeterBuilder::new().config().unwrap();
        assert_eq!(config.prefix, "meter");
        assert_eq!(config.tick_interval, Duration::from_secs(10));
        assert_eq!(config.refresh_interval, Duration::from_millis(100));
        assert!(config.filters.is_empty());
    }

    #[test]
    fn test_builder_programmatic_override() {
        let config = MeterBuilder::new()
            .prefix("myapp")
            .tick_interval(Duration::from_secs(2))
            .refresh_interval(Duration::from_millis(25))
            .include("dispatcher", "*")
            .exclude("dispatcher", "internal-*")
            .config()
            .unwrap();

        assert_eq!(config.prefix, "myapp");
        assert_eq!(config.tick_interval, Duration::from_secs(2));
        assert_eq!(config.refresh_interval, Duration::from_millis(25));
        assert_eq!(
            config.filters["dispatcher"],
            FilterConfig::new(["*"], ["internal-*"])
        );
    }

    #[test]
    fn test_builder_filter_replaces_and_extends() {
        let config = MeterBuilder::new()
            .include("pool", "a-*")
            .filter("pool", FilterConfig::new(["b-*"], ["b-skip"]))
            .include("pool", "c-*")
            .config()
            .unwrap();
        assert_eq!(
            config.filters["pool"],
            FilterConfig::new(["b-*", "c-*"], ["b-skip"])
        );
    }

    #[test]
    fn test_builder_file_then_programmatic() {
        let dir = std::env::temp_dir().join(format!("meter-builder-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("meter.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
prefix = "fromfile"
tick_interval = "3s"

[filters.dispatcher]
includes = ["*"]
"#
        )
        .unwrap();

        let config = MeterBuilder::new()
            .file(&path)
            .tick_interval(Duration::from_secs(7))
            .exclude("dispatcher", "skip-me")
            .config()
            .unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(config.prefix, "fromfile");
        assert_eq!(config.tick_interval, Duration::from_secs(7));
        assert_eq!(
            config.filters["dispatcher"],
            FilterConfig::new(["*"], ["skip-me"])
        );
    }

    #[test]
    fn test_builder_env_prefix() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("METERTEST_TICK_INTERVAL", "4s");
            jail.set_env("METERTEST_PREFIX", "envapp");

            let config = MeterBuilder::new()
                .env_prefix("METERTEST")
                .config()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.prefix, "envapp");
            assert_eq!(config.tick_interval, Duration::from_secs(4));
            assert_eq!(config.refresh_interval, Duration::from_millis(100));
            Ok(())
        });
    }

    #[test]
    fn test_builder_cli_args() {
        let args = MeterArgs {
            meter_prefix: Some("cliapp".to_string()),
            meter_tick_interval: Some("1s".parse().unwrap()),
            meter_refresh_interval: None,
        };

        let config = MeterBuilder::new()
            .prefix("original")
            .refresh_interval(Duration::from_millis(20))
            .with_cli_args(&args)
            .config()
            .unwrap();

        // CLI args should override programmatic values
        assert_eq!(config.prefix, "cliapp");
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        // Only set values are overridden
        assert_eq!(config.refresh_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let result = MeterBuilder::new().tick_interval(Duration::ZERO).build();
        assert!(matches!(
            result,
            Err(MeterError::InvalidInterval {
                name: "tick_interval"
            })
        ));
    }

    #[test]
    fn test_builder_registers_prometheus() {
        let registry = Registry::new();
        let meter = MeterBuilder::new()
            .prefix("built")
            .prometheus_registry(registry.clone())
            .build()
            .unwrap();
        meter.refresh_all();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"built_refresh_cycles".to_string()));
    }
}
