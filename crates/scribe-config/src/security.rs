//! Trust settings consulted by plugin path and manifest validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Path and manifest trust configuration.
///
/// An empty allow-list leaves plugin locations unrestricted.
///
/// # Example
///
/// ```
/// use scribe_config::SecurityConfig;
///
/// let config = SecurityConfig::default().with_allowed_dir("/opt/scribe/plugins");
/// assert!(config.is_restricted());
/// assert!(config.require_manifest());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    allowed_plugin_dirs: Vec<PathBuf>,
    require_manifest: bool,
    restrict_to_known_kinds: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_plugin_dirs: Vec::new(),
            require_manifest: true,
            restrict_to_known_kinds: false,
        }
    }
}

impl SecurityConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory plugins may be loaded from.
    #[must_use]
    pub fn with_allowed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.allowed_plugin_dirs.push(dir.into());
        self
    }

    /// Sets whether manifests must carry a plugin identifier.
    #[must_use]
    pub const fn with_require_manifest(mut self, require: bool) -> Self {
        self.require_manifest = require;
        self
    }

    /// Sets whether manifests must declare a registered kind.
    #[must_use]
    pub const fn with_restrict_to_known_kinds(mut self, restrict: bool) -> Self {
        self.restrict_to_known_kinds = restrict;
        self
    }

    /// Directories plugins may be loaded from.
    #[must_use]
    pub fn allowed_plugin_dirs(&self) -> &[PathBuf] {
        &self.allowed_plugin_dirs
    }

    /// Returns `true` when an allow-list is configured.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        !self.allowed_plugin_dirs.is_empty()
    }

    /// Whether manifests must carry a plugin identifier.
    #[must_use]
    pub const fn require_manifest(&self) -> bool {
        self.require_manifest
    }

    /// Whether manifests must declare a registered kind.
    #[must_use]
    pub const fn restrict_to_known_kinds(&self) -> bool {
        self.restrict_to_known_kinds
    }

    /// Iterates the allow-list as borrowed paths.
    pub fn allowed_dirs(&self) -> impl Iterator<Item = &Path> {
        self.allowed_plugin_dirs.iter().map(PathBuf::as_path)
    }
}
