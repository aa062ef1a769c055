//! Plugin discovery from a directory tree.
//!
//! Two layouts are accepted side by side:
//!
//! ```text
//! plugins/<plugin-dir>/plugin.json          # flat
//! plugins/<kind>/<plugin-dir>/plugin.json   # kind-nested
//! ```
//!
//! A top-level directory holding a manifest is a flat plugin. Otherwise, if
//! its name is a registered kind, its subdirectories are candidate plugins.
//! Anything else is ignored. Malformed manifests and unreadable kind
//! directories are logged and skipped so a single broken plugin cannot hide
//! the rest. Only an unreadable root is an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PluginError;
use crate::manifest::{MANIFEST_FILE_NAME, Plugin, PluginKind, PluginManifest};

const DISCOVERY_TARGET: &str = "scribe_plugins::discovery";

/// Discovers every plugin under `directory`.
///
/// Returned plugin directories are absolute.
///
/// # Errors
///
/// Returns [`PluginError::Io`] when `directory` exists but cannot be read. A
/// missing directory yields an empty list.
///
/// # Example
///
/// ```
/// use scribe_plugins::discovery::discover;
///
/// let plugins = discover(std::path::Path::new("/definitely/not/here"))
///     .expect("missing directories are not an error");
/// assert!(plugins.is_empty());
/// ```
pub fn discover(directory: &Path) -> Result<Vec<Plugin>, PluginError> {
    let root = std::path::absolute(directory).map_err(|err| PluginError::io(directory, err))?;
    let Some(entries) = read_dir_if_exists(&root)? else {
        debug!(
            target: DISCOVERY_TARGET,
            path = %root.display(),
            "plugin directory does not exist"
        );
        return Ok(Vec::new());
    };

    let mut plugins = Vec::new();
    for dir in entries {
        if dir.join(MANIFEST_FILE_NAME).is_file() {
            plugins.extend(load_candidate(&dir));
            continue;
        }

        let is_kind_dir = dir
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(PluginKind::is_registered);
        if !is_kind_dir {
            debug!(
                target: DISCOVERY_TARGET,
                path = %dir.display(),
                "ignoring directory without manifest"
            );
            continue;
        }

        plugins.extend(scan_kind_dir(&dir));
    }

    debug!(
        target: DISCOVERY_TARGET,
        path = %root.display(),
        count = plugins.len(),
        "plugin discovery complete"
    );
    Ok(plugins)
}

/// Lists subdirectories, or `None` when `dir` is missing.
fn read_dir_if_exists(dir: &Path) -> Result<Option<Vec<PathBuf>>, PluginError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(PluginError::io(dir, err)),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) if entry.path().is_dir() => dirs.push(entry.path()),
            Ok(_) => {}
            Err(error) => warn!(
                target: DISCOVERY_TARGET,
                path = %dir.display(),
                %error,
                "skipping unreadable directory entry"
            ),
        }
    }
    dirs.sort();
    Ok(Some(dirs))
}

/// Loads the plugins nested under a kind directory. An unreadable kind
/// directory is logged and contributes nothing.
fn scan_kind_dir(dir: &Path) -> Vec<Plugin> {
    let children = match read_dir_if_exists(dir) {
        Ok(children) => children.unwrap_or_default(),
        Err(error) => {
            warn!(
                target: DISCOVERY_TARGET,
                path = %dir.display(),
                %error,
                "skipping unreadable kind directory"
            );
            return Vec::new();
        }
    };
    children
        .into_iter()
        .filter(|child| child.join(MANIFEST_FILE_NAME).is_file())
        .filter_map(|child| load_candidate(&child))
        .collect()
}

/// Parses one plugin directory, logging and skipping on failure.
fn load_candidate(dir: &Path) -> Option<Plugin> {
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    match PluginManifest::from_path(&manifest_path) {
        Ok(manifest) => {
            debug!(
                target: DISCOVERY_TARGET,
                plugin_id = manifest.plugin_id(),
                path = %dir.display(),
                "discovered plugin"
            );
            Some(Plugin::external(manifest, dir))
        }
        Err(error) => {
            warn!(
                target: DISCOVERY_TARGET,
                path = %manifest_path.display(),
                %error,
                "skipping plugin with invalid manifest"
            );
            None
        }
    }
}
