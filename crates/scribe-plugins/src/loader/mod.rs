//! The plugin table consulted by hosts.
//!
//! A [`PluginLoader`] starts with every embedded plugin known to its
//! [`HostContext`] and grows as plugin directories are loaded. Discovered
//! plugins replace embedded entries with the same id. Every entry has passed
//! manifest validation and the host-version check; incompatible plugins are
//! logged and skipped rather than failing the load.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, warn};

use crate::context::HostContext;
use crate::discovery::discover;
use crate::error::PluginError;
use crate::manifest::Plugin;
use crate::version::check_plugin_compatibility;

const LOADER_TARGET: &str = "scribe_plugins::loader";

/// Table of loadable plugins keyed by id.
///
/// # Example
///
/// ```
/// use scribe_plugins::{HostContext, PluginLoader};
///
/// let context = HostContext::new();
/// let loader = PluginLoader::new(&context);
/// assert!(loader.get("format.missing").is_err());
/// ```
#[derive(Debug)]
pub struct PluginLoader {
    context: HostContext,
    plugins: RwLock<HashMap<String, Plugin>>,
}

impl PluginLoader {
    /// Creates a loader seeded with the context's embedded plugins.
    #[must_use]
    pub fn new(context: &HostContext) -> Self {
        let plugins = context
            .embedded()
            .list()
            .into_iter()
            .map(|embedded| {
                let manifest = embedded.manifest().clone();
                (manifest.plugin_id().to_owned(), Plugin::embedded(manifest))
            })
            .collect();
        Self {
            context: context.clone(),
            plugins: RwLock::new(plugins),
        }
    }

    /// Host context the loader was built from.
    #[must_use]
    pub const fn context(&self) -> &HostContext {
        &self.context
    }

    /// Loads plugins under `directory` when external plugins are enabled.
    ///
    /// Returns the number of plugins added; zero when external plugins are
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] when `directory` exists but cannot be
    /// read.
    pub fn load_from_directory(&self, directory: &Path) -> Result<usize, PluginError> {
        if !self.context.external_plugins_enabled() {
            debug!(
                target: LOADER_TARGET,
                path = %directory.display(),
                "external plugins disabled; skipping directory"
            );
            return Ok(0);
        }
        self.load_from_directory_unconditional(directory)
    }

    /// Loads plugins under `directory` regardless of the external-plugin
    /// switch.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] when `directory` exists but cannot be
    /// read.
    pub fn load_from_directory_unconditional(&self, directory: &Path) -> Result<usize, PluginError> {
        let host = self.context.host_version().to_string();
        let mut loaded = 0;
        for plugin in discover(directory)? {
            if let Err(err) = check_plugin_compatibility(plugin.manifest(), &host) {
                warn!(
                    target: LOADER_TARGET,
                    plugin_id = plugin.id(),
                    error = %err,
                    "skipping incompatible plugin"
                );
                continue;
            }
            debug!(target: LOADER_TARGET, plugin_id = plugin.id(), "loaded plugin");
            self.add(plugin);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Loads several roots in order; later roots override earlier ones.
    ///
    /// # Errors
    ///
    /// Stops at the first root that exists but cannot be read.
    pub fn load_from_directories<I, P>(&self, directories: I) -> Result<usize, PluginError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        directories
            .into_iter()
            .try_fold(0, |total, dir| Ok(total + self.load_from_directory(dir.as_ref())?))
    }

    /// Loads the plugin roots named in the host configuration.
    ///
    /// # Errors
    ///
    /// See [`Self::load_from_directories`].
    pub fn load_configured(&self) -> Result<usize, PluginError> {
        self.load_from_directories(self.context.plugin_dirs())
    }

    /// Inserts a plugin directly, replacing any entry with the same id.
    pub fn add(&self, plugin: Plugin) {
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(plugin.id().to_owned(), plugin);
    }

    /// Looks up a plugin by id.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] when no plugin has that id.
    pub fn get(&self, id: &str) -> Result<Plugin, PluginError> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| PluginError::NotFound { id: id.to_owned() })
    }

    /// Every plugin, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<Plugin> {
        self.snapshot(|_| true)
    }

    /// Plugins whose manifest declares `kind`, ordered by id.
    #[must_use]
    pub fn list_by_kind(&self, kind: &str) -> Vec<Plugin> {
        self.snapshot(|plugin| plugin.manifest().kind() == kind)
    }

    /// Plugins declaring IR extraction or emission, ordered by id.
    #[must_use]
    pub fn list_ir_capable(&self) -> Vec<Plugin> {
        self.snapshot(Plugin::is_ir_capable)
    }

    /// Number of plugins in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self, keep: impl Fn(&Plugin) -> bool) -> Vec<Plugin> {
        let mut plugins: Vec<Plugin> = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|plugin| keep(plugin))
            .cloned()
            .collect();
        plugins.sort_by(|a, b| a.id().cmp(b.id()));
        plugins
    }
}
