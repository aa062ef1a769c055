//! Shared configuration for the scribe plugin host.
//!
//! [`HostConfig`] gathers the settings a host application needs before it
//! loads any plugin: logging, the directories to scan, whether external
//! plugins are enabled, the default execution deadline, and the
//! [`SecurityConfig`] consulted by path and manifest validation. Every field
//! has a default, so an empty JSON object is a valid configuration.
//!
//! ```
//! use scribe_config::{HostConfig, LogFormat};
//!
//! let config = HostConfig::from_json(r#"{"external_plugins": true}"#)
//!     .expect("valid configuration");
//! assert!(config.external_plugins());
//! assert_eq!(config.log_format(), LogFormat::Json);
//! assert_eq!(config.execution_timeout().as_secs(), 60);
//! ```

mod defaults;
mod logging;
mod security;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_EXECUTION_TIMEOUT_SECS, DEFAULT_LOG_FILTER, MANIFEST_FILE_NAME,
    default_execution_timeout_secs, default_log_filter, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use security::SecurityConfig;

/// Host-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_log_filter")]
    log_filter: String,
    #[serde(default = "default_log_format")]
    log_format: LogFormat,
    #[serde(default)]
    plugin_dirs: Vec<PathBuf>,
    #[serde(default)]
    external_plugins: bool,
    #[serde(default = "defaults::default_true")]
    allow_deferred_external: bool,
    #[serde(default = "default_execution_timeout_secs")]
    execution_timeout_secs: u64,
    #[serde(default)]
    security: SecurityConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            log_format: default_log_format(),
            plugin_dirs: Vec::new(),
            external_plugins: false,
            allow_deferred_external: true,
            execution_timeout_secs: DEFAULT_EXECUTION_TIMEOUT_SECS,
            security: SecurityConfig::default(),
        }
    }
}

impl HostConfig {
    /// Parses a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is not valid JSON or
    /// a field has the wrong type.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse { source })
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::ParseFile`] when its content is invalid.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overrides the log filter.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Overrides the log format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Adds a plugin directory to scan.
    #[must_use]
    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dirs.push(dir.into());
        self
    }

    /// Sets the initial external-plugin enable flag.
    #[must_use]
    pub const fn with_external_plugins(mut self, enabled: bool) -> Self {
        self.external_plugins = enabled;
        self
    }

    /// Sets whether embedded deferrals may run external binaries while
    /// external plugins are disabled.
    #[must_use]
    pub const fn with_allow_deferred_external(mut self, allow: bool) -> Self {
        self.allow_deferred_external = allow;
        self
    }

    /// Overrides the default execution timeout.
    #[must_use]
    pub const fn with_execution_timeout_secs(mut self, secs: u64) -> Self {
        self.execution_timeout_secs = secs;
        self
    }

    /// Replaces the security configuration.
    #[must_use]
    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Directories scanned for external plugins.
    #[must_use]
    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    /// Initial external-plugin enable flag.
    #[must_use]
    pub const fn external_plugins(&self) -> bool {
        self.external_plugins
    }

    /// Whether embedded deferrals bypass a disabled external flag.
    #[must_use]
    pub const fn allow_deferred_external(&self) -> bool {
        self.allow_deferred_external
    }

    /// Default execution deadline.
    #[must_use]
    pub const fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    /// Path and manifest trust configuration.
    #[must_use]
    pub const fn security(&self) -> &SecurityConfig {
        &self.security
    }
}

/// Errors raised while loading a [`HostConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration '{}': {source}", .path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration document was malformed.
    #[error("invalid configuration: {source}")]
    Parse {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A configuration file held a malformed document.
    #[error("invalid configuration in '{}': {source}", .path.display())]
    ParseFile {
        /// File the document came from.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = HostConfig::from_json("{}").expect("empty object parses");
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.log_filter(), "info");
        assert!(!config.external_plugins());
        assert!(config.allow_deferred_external());
        assert!(config.security().require_manifest());
        assert!(!config.security().is_restricted());
    }

    #[rstest]
    #[case::json("json", LogFormat::Json)]
    #[case::compact("compact", LogFormat::Compact)]
    #[case::mixed_case("Compact", LogFormat::Compact)]
    fn log_format_parses_from_text(#[case] text: &str, #[case] expected: LogFormat) {
        let parsed: LogFormat = text.parse().expect("known format");
        assert_eq!(parsed, expected);
    }

    #[test]
    fn security_section_is_read() {
        let config = HostConfig::from_json(
            r#"{"security": {"allowed_plugin_dirs": ["/opt/plugins"], "restrict_to_known_kinds": true}}"#,
        )
        .expect("valid");
        assert_eq!(
            config.security().allowed_plugin_dirs(),
            &[PathBuf::from("/opt/plugins")]
        );
        assert!(config.security().restrict_to_known_kinds());
        assert!(config.security().require_manifest());
    }

    #[test]
    fn wrong_field_type_is_a_parse_error() {
        let err = HostConfig::from_json(r#"{"execution_timeout_secs": "soon"}"#)
            .expect_err("string timeout must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
