//! Process-wide plugin host state.
//!
//! [`HostContext`] bundles everything the loader and executor consult at run
//! time: the embedded registry, the security configuration, the
//! external-plugin switch and the host version. Clones share the same state,
//! so a context built once during start-up can be handed to every component.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use scribe_config::{HostConfig, SecurityConfig};
use tracing::info;

use crate::embedded::EmbeddedRegistry;
use crate::version::Version;

const CONTEXT_TARGET: &str = "scribe_plugins::context";

/// Version of this host, consulted by plugin compatibility checks.
pub const HOST_VERSION: Version = Version::new(0, 1, 0);

/// Shared plugin host state.
///
/// # Example
///
/// ```
/// use scribe_plugins::HostContext;
///
/// let context = HostContext::new();
/// assert!(!context.external_plugins_enabled());
///
/// let shared = context.clone();
/// shared.enable_external_plugins();
/// assert!(context.external_plugins_enabled());
/// ```
#[derive(Debug, Clone)]
pub struct HostContext {
    embedded: EmbeddedRegistry,
    security: Arc<RwLock<SecurityConfig>>,
    external_enabled: Arc<AtomicBool>,
    allow_deferred_external: bool,
    host_version: Version,
    plugin_dirs: Arc<[PathBuf]>,
    execution_timeout: Duration,
}

impl Default for HostContext {
    fn default() -> Self {
        Self::from_config(&HostConfig::default())
    }
}

impl HostContext {
    /// Creates a context with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded from host configuration.
    #[must_use]
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            embedded: EmbeddedRegistry::new(),
            security: Arc::new(RwLock::new(config.security().clone())),
            external_enabled: Arc::new(AtomicBool::new(config.external_plugins())),
            allow_deferred_external: config.allow_deferred_external(),
            host_version: HOST_VERSION,
            plugin_dirs: config.plugin_dirs().into(),
            execution_timeout: config.execution_timeout(),
        }
    }

    /// Overrides the host version reported to compatibility checks.
    #[must_use]
    pub const fn with_host_version(mut self, version: Version) -> Self {
        self.host_version = version;
        self
    }

    /// Uses an existing embedded registry instead of a fresh one.
    #[must_use]
    pub fn with_embedded_registry(mut self, registry: EmbeddedRegistry) -> Self {
        self.embedded = registry;
        self
    }

    /// The embedded plugin registry.
    #[must_use]
    pub const fn embedded(&self) -> &EmbeddedRegistry {
        &self.embedded
    }

    /// Allows filesystem plugins to be loaded and preferred.
    pub fn enable_external_plugins(&self) {
        info!(target: CONTEXT_TARGET, "external plugins enabled");
        self.external_enabled.store(true, Ordering::SeqCst);
    }

    /// Stops loading and preferring filesystem plugins.
    pub fn disable_external_plugins(&self) {
        info!(target: CONTEXT_TARGET, "external plugins disabled");
        self.external_enabled.store(false, Ordering::SeqCst);
    }

    /// Whether filesystem plugins are enabled.
    #[must_use]
    pub fn external_plugins_enabled(&self) -> bool {
        self.external_enabled.load(Ordering::SeqCst)
    }

    /// Whether an embedded deferral may run an external binary while
    /// external plugins are disabled.
    #[must_use]
    pub const fn allow_deferred_external(&self) -> bool {
        self.allow_deferred_external
    }

    /// Replaces the security configuration.
    pub fn set_security_config(&self, config: SecurityConfig) {
        *self
            .security
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Snapshot of the security configuration.
    #[must_use]
    pub fn security_config(&self) -> SecurityConfig {
        self.security
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Version compared against `min_host_version`.
    #[must_use]
    pub const fn host_version(&self) -> Version {
        self.host_version
    }

    /// Plugin roots named in configuration.
    #[must_use]
    pub fn plugin_dirs(&self) -> impl Iterator<Item = &Path> {
        self.plugin_dirs.iter().map(PathBuf::as_path)
    }

    /// Subprocess deadline used when a caller supplies none.
    #[must_use]
    pub const fn execution_timeout(&self) -> Duration {
        self.execution_timeout
    }
}
