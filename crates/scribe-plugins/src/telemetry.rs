//! Structured telemetry initialisation for plugin hosts.
//!
//! Hosts and external plugin binaries share this set-up. Output always goes
//! to stderr because stdout carries protocol responses in plugin processes.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use scribe_config::{HostConfig, LogFormat};

/// Environment variable that overrides the configured log filter.
pub const LOG_FILTER_ENV: &str = "SCRIBE_LOG";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression is invalid.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The tracing subscriber could not be installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// The filter comes from [`LOG_FILTER_ENV`] when set, otherwise from
/// `log_filter`. Later calls return a fresh [`TelemetryHandle`] without
/// touching global state.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or another
/// subscriber is already installed.
///
/// # Examples
///
/// ```rust
/// use scribe_config::HostConfig;
/// use scribe_plugins::telemetry;
///
/// # fn main() -> Result<(), scribe_plugins::telemetry::TelemetryError> {
/// let config = HostConfig::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// drop(first);
/// drop(second);
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &HostConfig) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &HostConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(&filter_directive(config))?;

    let builder = |env_filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn filter_directive(config: &HostConfig) -> String {
    std::env::var(LOG_FILTER_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.log_filter().to_owned())
}

fn build_filter(directive: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directive).map_err(|error| TelemetryError::Filter(error.to_string()))
}
