//! Crate-level integration and BDD tests.

use std::fs;

use serde_json::json;
use tempfile::TempDir;

use crate::context::HostContext;
use crate::error::PluginError;
use crate::executor::IpcExecutor;
use crate::loader::PluginLoader;
use crate::manifest::MANIFEST_FILE_NAME;
use crate::process::{ProcessRunner, ProcessSpec};
use crate::protocol::{IpcRequest, IpcResponse};


/// Runner answering every request with a fixed external marker.
struct StubRunner;

impl ProcessRunner for StubRunner {
    fn run(&self, spec: &ProcessSpec, request: &IpcRequest) -> Result<IpcResponse, PluginError> {
        Ok(IpcResponse::ok(json!({
            "runner": "external",
            "plugin_id": spec.plugin_id(),
            "command": request.command(),
        })))
    }
}

#[test]
fn end_to_end_discovery_and_execution_with_stub() {
    let root = TempDir::new().expect("temp dir");
    let plugin_dir = root.path().join("tool").join("lint");
    fs::create_dir_all(&plugin_dir).expect("plugin dir");
    fs::write(
        plugin_dir.join(MANIFEST_FILE_NAME),
        r#"{"plugin_id":"tool.lint","version":"1.0.0","kind":"tool","entrypoint":"lint"}"#,
    )
    .expect("manifest");
    fs::write(plugin_dir.join("lint"), "").expect("entrypoint");

    let context = HostContext::new();
    context.enable_external_plugins();
    let loader = PluginLoader::new(&context);
    assert_eq!(loader.load_from_directory(root.path()).expect("load"), 1);

    let executor = IpcExecutor::with_runner(&context, StubRunner);
    let response = executor
        .execute_by_id(&loader, "tool.lint", &IpcRequest::new("check"), None)
        .expect("execute");
    assert_eq!(response.result()["plugin_id"], json!("tool.lint"));
    assert_eq!(response.result()["command"], json!("check"));
}
