//! Domain errors raised by plugin host operations.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::version::VersionError;

/// Errors arising from plugin host operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The requested plugin is not known to the loader.
    #[error("plugin '{id}' not found")]
    NotFound {
        /// Identifier that was looked up.
        id: String,
    },

    /// A plugin directory has no manifest file.
    #[error("manifest not found: {}", .path.display())]
    ManifestMissing {
        /// Manifest path that was checked.
        path: PathBuf,
    },

    /// A plugin manifest failed structural validation.
    #[error("manifest error: {message}")]
    Manifest {
        /// Description of the validation failure.
        message: String,
    },

    /// A version string could not be parsed.
    #[error("invalid version for {context}: {source}")]
    InvalidVersion {
        /// What the version described (e.g. `host`, `min_host_version`).
        context: String,
        /// Underlying parse failure.
        #[source]
        source: VersionError,
    },

    /// The plugin requires a host version this host does not satisfy.
    #[error("plugin '{id}' requires host version {required}, running {host}")]
    IncompatibleVersion {
        /// Plugin identifier.
        id: String,
        /// Declared minimum host version.
        required: String,
        /// Version of the running host.
        host: String,
    },

    /// A path or manifest failed a trust check.
    #[error("security check failed: {message}")]
    Security {
        /// Description of the rejected input.
        message: String,
    },

    /// A path that had to exist does not.
    #[error("path does not exist: {}", .path.display())]
    PathNotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("I/O error for '{}': {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The plugin process could not be spawned or driven.
    #[error("plugin '{id}' failed to start: {message}")]
    SpawnFailed {
        /// Plugin identifier.
        id: String,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// The plugin did not complete within the configured deadline.
    #[error("plugin '{id}' timed out after {timeout:?}")]
    Timeout {
        /// Plugin identifier.
        id: String,
        /// Configured deadline.
        timeout: Duration,
    },

    /// The plugin exited with a non-zero status code.
    #[error("plugin '{id}' exited with status {status}: {stderr}")]
    NonZeroExit {
        /// Plugin identifier.
        id: String,
        /// Process exit status, `-1` when terminated by a signal.
        status: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The request could not be serialised for the wire.
    #[error("failed to serialise plugin request: {0}")]
    SerializeRequest(#[source] serde_json::Error),

    /// The plugin wrote something that is not a protocol response.
    #[error("plugin '{id}' produced an invalid response: {message}; raw output: {raw}")]
    DeserializeResponse {
        /// Plugin identifier.
        id: String,
        /// Description of the parse failure.
        message: String,
        /// Raw standard output, kept for diagnosis.
        raw: String,
    },

    /// The plugin answered with an `error` status.
    #[error("plugin error: {message}")]
    PluginReported {
        /// Message supplied by the plugin.
        message: String,
    },

    /// A successful result did not have the expected shape.
    #[error("unexpected {expected} payload: {message}")]
    ResultShape {
        /// Name of the expected result type.
        expected: &'static str,
        /// Description of the mismatch.
        message: String,
    },

    /// Neither an embedded handler nor an external binary can serve the
    /// request.
    #[error("plugin '{id}' is unavailable: no embedded handler and no external binary")]
    Unavailable {
        /// Plugin identifier.
        id: String,
    },
}

impl PluginError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    pub(crate) fn security(message: impl Into<String>) -> Self {
        Self::Security {
            message: message.into(),
        }
    }

    /// Returns `true` for deadline failures.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
