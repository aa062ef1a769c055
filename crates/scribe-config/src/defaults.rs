//! Default values shared by the host configuration and its consumers.

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default deadline, in seconds, for a single external plugin invocation.
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 60;

/// File name every plugin directory must contain.
pub const MANIFEST_FILE_NAME: &str = "plugin.json";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default execution timeout in seconds.
#[must_use]
pub const fn default_execution_timeout_secs() -> u64 {
    DEFAULT_EXECUTION_TIMEOUT_SECS
}

pub(crate) const fn default_true() -> bool {
    true
}
