//! Path and manifest trust checks.
//!
//! Every check reads a [`SecurityConfig`]. An empty allow-list leaves plugin
//! locations unrestricted; the traversal and file-type checks apply
//! regardless. Failures are always surfaced as [`PluginError::Security`] (or
//! a not-found/I/O error for stat failures) and never downgraded.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use scribe_config::SecurityConfig;
use tracing::debug;

use crate::error::PluginError;
use crate::manifest::{Plugin, PluginKind, PluginManifest};

const SECURITY_TARGET: &str = "scribe_plugins::security";

/// Returns `true` when any component of `path` is `..`.
#[must_use]
pub fn has_parent_traversal(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, Component::ParentDir))
}

/// Validates a plugin entrypoint path.
///
/// Accepts only existing regular files (inside an allowed directory when an
/// allow-list is configured). Symbolic links are always rejected; their
/// target directory is checked against the allow-list first.
///
/// # Errors
///
/// Returns [`PluginError::Security`] for empty paths, traversal segments,
/// non-regular files and paths outside the allow-list,
/// [`PluginError::PathNotFound`] for missing paths and [`PluginError::Io`]
/// for other stat failures.
pub fn validate_plugin_path(config: &SecurityConfig, path: &Path) -> Result<(), PluginError> {
    if path.as_os_str().is_empty() {
        return Err(PluginError::security("plugin path is empty"));
    }
    if has_parent_traversal(path) {
        return Err(PluginError::security(format!(
            "plugin path '{}' contains a parent-directory traversal",
            path.display()
        )));
    }

    let absolute = std::path::absolute(path).map_err(|err| PluginError::io(path, err))?;
    let metadata = fs::symlink_metadata(&absolute).map_err(|err| match err.kind() {
        ErrorKind::NotFound => PluginError::PathNotFound {
            path: absolute.clone(),
        },
        _ => PluginError::io(&absolute, err),
    })?;

    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        let target = fs::canonicalize(&absolute).map_err(|err| PluginError::io(&absolute, err))?;
        debug!(
            target: SECURITY_TARGET,
            link = %absolute.display(),
            target_path = %target.display(),
            "validating symlink target directory"
        );
        if let Some(target_dir) = target.parent() {
            validate_plugin_directory(config, target_dir)?;
        }
    }

    if !file_type.is_file() {
        return Err(PluginError::security(format!(
            "plugin path '{}' is not a regular file",
            absolute.display()
        )));
    }

    validate_plugin_directory(config, &absolute)
}

/// Checks that `path` lies inside one of the allowed plugin directories.
///
/// Always passes when no allow-list is configured. Allowed directories whose
/// relative-path computation fails are skipped, never treated as a match.
///
/// # Errors
///
/// Returns [`PluginError::Security`] when `path` is outside every allowed
/// directory.
pub fn validate_plugin_directory(config: &SecurityConfig, path: &Path) -> Result<(), PluginError> {
    if !config.is_restricted() {
        return Ok(());
    }

    let candidate = resolve(path);
    let allowed = config.allowed_dirs().any(|dir| {
        let root = resolve(dir);
        candidate
            .strip_prefix(&root)
            .is_ok_and(|relative| !has_parent_traversal(relative))
    });

    if allowed {
        Ok(())
    } else {
        Err(PluginError::security(format!(
            "'{}' is outside the allowed plugin directories",
            path.display()
        )))
    }
}

/// Canonicalises the longest existing ancestor and re-appends the rest, so
/// paths that do not exist yet still compare against canonical roots.
fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut existing = absolute.as_path();
    let mut remainder = Vec::new();
    loop {
        if let Ok(mut resolved) = fs::canonicalize(existing) {
            for part in remainder.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                remainder.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

/// Applies manifest-level trust rules.
///
/// # Errors
///
/// Returns [`PluginError::Security`] when `require_manifest` is set and the
/// identifier is empty, when `restrict_to_known_kinds` is set and the kind is
/// not registered, and always when the entrypoint contains `..` or is
/// absolute.
pub fn validate_manifest_security(
    config: &SecurityConfig,
    manifest: &PluginManifest,
) -> Result<(), PluginError> {
    if config.require_manifest() && manifest.plugin_id().trim().is_empty() {
        return Err(PluginError::security("manifest has no plugin_id"));
    }
    if config.restrict_to_known_kinds() && !PluginKind::is_registered(manifest.kind()) {
        return Err(PluginError::security(format!(
            "plugin '{}' declares unknown kind '{}'",
            manifest.plugin_id(),
            manifest.kind()
        )));
    }
    let entrypoint = Path::new(manifest.entrypoint());
    if entrypoint.is_absolute() {
        return Err(PluginError::security(format!(
            "plugin '{}' entrypoint '{}' must be relative to the plugin directory",
            manifest.plugin_id(),
            manifest.entrypoint()
        )));
    }
    if has_parent_traversal(entrypoint) {
        return Err(PluginError::security(format!(
            "plugin '{}' entrypoint '{}' contains a parent-directory traversal",
            manifest.plugin_id(),
            manifest.entrypoint()
        )));
    }
    Ok(())
}

/// Resolves a plugin's entrypoint after applying every trust check.
///
/// # Errors
///
/// Returns [`PluginError::Security`] for embedded plugins (they have no
/// entrypoint) and any error raised by [`validate_manifest_security`] or
/// [`validate_plugin_path`].
pub fn secure_entrypoint_path(
    config: &SecurityConfig,
    plugin: &Plugin,
) -> Result<PathBuf, PluginError> {
    validate_manifest_security(config, plugin.manifest())?;
    let Some(path) = plugin.entrypoint_path() else {
        return Err(PluginError::security(format!(
            "plugin '{}' is embedded and has no entrypoint",
            plugin.id()
        )));
    };
    validate_plugin_path(config, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests;
