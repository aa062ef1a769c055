//! Unit tests for path and manifest trust checks.

use std::fs;
use std::path::{Path, PathBuf};

use rstest::{fixture, rstest};
use scribe_config::SecurityConfig;
use tempfile::TempDir;

use super::*;
use crate::error::PluginError;
use crate::manifest::{Plugin, PluginKind, PluginManifest};

struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn allowed(&self) -> PathBuf {
        self.root.path().join("allowed")
    }

    fn outside(&self) -> PathBuf {
        self.root.path().join("outside")
    }

    fn file_in(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").expect("write file");
        path
    }

    fn restricted(&self) -> SecurityConfig {
        SecurityConfig::default().with_allowed_dir(self.allowed())
    }
}

#[fixture]
fn sandbox() -> Sandbox {
    let root = TempDir::new().expect("temp dir");
    fs::create_dir(root.path().join("allowed")).expect("allowed dir");
    fs::create_dir(root.path().join("outside")).expect("outside dir");
    Sandbox { root }
}

// ---------------------------------------------------------------------------
// validate_plugin_path
// ---------------------------------------------------------------------------

#[rstest]
fn accepts_regular_file_when_unrestricted(sandbox: Sandbox) {
    let file = sandbox.file_in(&sandbox.outside(), "plugin");
    assert!(validate_plugin_path(&SecurityConfig::default(), &file).is_ok());
}

#[rstest]
fn accepts_regular_file_inside_allowed_dir(sandbox: Sandbox) {
    let file = sandbox.file_in(&sandbox.allowed(), "plugin");
    assert!(validate_plugin_path(&sandbox.restricted(), &file).is_ok());
}

#[rstest]
fn rejects_file_outside_allowed_dirs(sandbox: Sandbox) {
    let file = sandbox.file_in(&sandbox.outside(), "plugin");
    let err = validate_plugin_path(&sandbox.restricted(), &file).expect_err("outside");
    assert!(matches!(err, PluginError::Security { .. }));
    assert!(err.to_string().contains("outside the allowed"), "message: {err}");
}

#[test]
fn rejects_empty_path() {
    let err = validate_plugin_path(&SecurityConfig::default(), Path::new("")).expect_err("empty");
    assert!(matches!(err, PluginError::Security { .. }));
}

#[rstest]
#[case::relative("../plugin")]
#[case::embedded("plugins/../../etc/passwd")]
#[case::absolute("/srv/plugins/../secret")]
fn rejects_parent_traversal(#[case] path: &str) {
    let err = validate_plugin_path(&SecurityConfig::default(), Path::new(path))
        .expect_err("traversal");
    assert!(err.to_string().contains("traversal"), "message: {err}");
}

#[rstest]
fn rejects_directory(sandbox: Sandbox) {
    let err = validate_plugin_path(&SecurityConfig::default(), &sandbox.allowed())
        .expect_err("directory");
    assert!(err.to_string().contains("not a regular file"), "message: {err}");
}

#[rstest]
fn rejects_missing_file(sandbox: Sandbox) {
    let missing = sandbox.allowed().join("absent");
    let err = validate_plugin_path(&SecurityConfig::default(), &missing).expect_err("missing");
    assert!(matches!(err, PluginError::PathNotFound { .. }));
}

#[cfg(unix)]
#[rstest]
fn rejects_symlink_even_inside_allowed_dir(sandbox: Sandbox) {
    let target = sandbox.file_in(&sandbox.allowed(), "real");
    let link = sandbox.allowed().join("link");
    std::os::unix::fs::symlink(&target, &link).expect("symlink");
    let err = validate_plugin_path(&sandbox.restricted(), &link).expect_err("symlink");
    assert!(err.to_string().contains("not a regular file"), "message: {err}");
}

#[cfg(unix)]
#[rstest]
fn symlink_escaping_allow_list_reports_target(sandbox: Sandbox) {
    let target = sandbox.file_in(&sandbox.outside(), "escape");
    let link = sandbox.allowed().join("link");
    std::os::unix::fs::symlink(&target, &link).expect("symlink");
    let err = validate_plugin_path(&sandbox.restricted(), &link).expect_err("escape");
    assert!(err.to_string().contains("outside the allowed"), "message: {err}");
}

// ---------------------------------------------------------------------------
// validate_plugin_directory
// ---------------------------------------------------------------------------

#[rstest]
fn directory_check_passes_without_allow_list(sandbox: Sandbox) {
    assert!(validate_plugin_directory(&SecurityConfig::default(), &sandbox.outside()).is_ok());
}

#[rstest]
fn directory_check_matches_any_allowed_root(sandbox: Sandbox) {
    let config = SecurityConfig::default()
        .with_allowed_dir(sandbox.root.path().join("missing-root"))
        .with_allowed_dir(sandbox.allowed());
    let nested = sandbox.allowed().join("format").join("demo");
    assert!(validate_plugin_directory(&config, &nested).is_ok());
    assert!(validate_plugin_directory(&config, &sandbox.outside()).is_err());
}

#[rstest]
fn directory_check_does_not_match_sibling_prefix(sandbox: Sandbox) {
    let sibling = sandbox.root.path().join("allowed-but-not-really");
    fs::create_dir(&sibling).expect("sibling dir");
    assert!(validate_plugin_directory(&sandbox.restricted(), &sibling).is_err());
}

// ---------------------------------------------------------------------------
// validate_manifest_security
// ---------------------------------------------------------------------------

fn manifest(id: &str, kind: &str, entrypoint: &str) -> PluginManifest {
    PluginManifest::new(id, "1.0.0", kind, entrypoint)
}

#[rstest]
#[case::traversal("../escape")]
#[case::nested_traversal("bin/../../escape")]
#[case::absolute("/usr/bin/env")]
fn manifest_entrypoint_must_stay_inside_plugin_dir(#[case] entrypoint: &str) {
    let permissive = SecurityConfig::default().with_require_manifest(false);
    let err = validate_manifest_security(&permissive, &manifest("a", "format", entrypoint))
        .expect_err("entrypoint escape");
    assert!(matches!(err, PluginError::Security { .. }));
}

#[test]
fn manifest_requires_identifier_when_configured() {
    let bare = manifest("", "format", "bin");
    assert!(validate_manifest_security(&SecurityConfig::default(), &bare).is_err());
    let lenient = SecurityConfig::default().with_require_manifest(false);
    assert!(validate_manifest_security(&lenient, &bare).is_ok());
}

#[test]
fn manifest_kind_restriction() {
    let odd = manifest("x.odd", "juniper", "bin");
    assert!(validate_manifest_security(&SecurityConfig::default(), &odd).is_ok());
    let strict = SecurityConfig::default().with_restrict_to_known_kinds(true);
    let err = validate_manifest_security(&strict, &odd).expect_err("unknown kind");
    assert!(err.to_string().contains("juniper"), "message: {err}");
    assert!(validate_manifest_security(&strict, &manifest("t", "tool", "bin")).is_ok());
}

// ---------------------------------------------------------------------------
// secure_entrypoint_path
// ---------------------------------------------------------------------------

#[rstest]
fn secure_entrypoint_resolves_existing_binary(sandbox: Sandbox) {
    let plugin_dir = sandbox.allowed().join("demo");
    fs::create_dir(&plugin_dir).expect("plugin dir");
    let binary = sandbox.file_in(&plugin_dir, "demo-bin");
    let plugin = Plugin::external(manifest("format.demo", "format", "demo-bin"), &plugin_dir);
    let resolved = secure_entrypoint_path(&sandbox.restricted(), &plugin).expect("secure path");
    assert_eq!(resolved, binary);
}

#[test]
fn secure_entrypoint_rejects_embedded_plugin() {
    let plugin = Plugin::embedded(manifest("format.demo", PluginKind::Format.as_str(), "x"));
    assert!(secure_entrypoint_path(&SecurityConfig::default(), &plugin).is_err());
}

#[rstest]
fn secure_entrypoint_rejects_traversal_before_touching_disk(sandbox: Sandbox) {
    let plugin = Plugin::external(manifest("evil", "tool", "../outside/x"), sandbox.allowed());
    let err = secure_entrypoint_path(&SecurityConfig::default(), &plugin).expect_err("traversal");
    assert!(matches!(err, PluginError::Security { .. }));
}
