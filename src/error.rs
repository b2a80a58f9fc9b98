//! Error types for meter-rs.

use thiserror::Error;

/// Errors that can occur when building or driving a [`Meter`](crate::Meter).
#[derive(Debug, Error)]
pub enum MeterError {
    /// Error extracting configuration from figment.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// A tick or refresh interval that cannot drive a ticker.
    #[error("invalid {name}: interval must be greater than zero")]
    InvalidInterval {
        /// Name of the offending setting.
        name: &'static str,
    },

    /// A gauge was declared without a value provider to refresh it from.
    #[error("no value provider for gauge {instrument} in category {category}")]
    MissingProvider {
        category: String,
        instrument: String,
    },

    /// Two descriptors of the same entity share a name.
    #[error("instrument {instrument} declared twice in category {category}")]
    DuplicateInstrument {
        category: String,
        instrument: String,
    },

    /// `start()` was called on a meter whose tickers are already running.
    #[error("meter tickers are already running")]
    AlreadyRunning,

    /// Error creating or registering self-observability metrics.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Error building the rayon pool behind a monitored dispatcher.
    #[error("failed to build rayon thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Work was submitted to a dispatcher after it shut down.
    #[error("dispatcher {name} is shut down")]
    DispatcherShutdown { name: String },
}

/// Result type alias for meter operations.
pub type Result<T> = std::result::Result<T, MeterError>;
