//! Unit tests for the embedded registry and dispatch.

use std::collections::BTreeMap;
use std::path::Path;

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::manifest::LossClass;
use crate::results::{EnumerateEntry, LossReport};

fn format_manifest(id: &str) -> PluginManifest {
    PluginManifest::new(id, "1.0.0", PluginKind::Format, "bin")
}

fn tool_manifest(id: &str) -> PluginManifest {
    PluginManifest::new(id, "1.0.0", PluginKind::Tool, "bin")
}

/// Format handler overriding only the mandatory operations.
struct Partial;

impl FormatHandler for Partial {
    fn detect(&self, path: &Path) -> Result<DetectResult, HandlerError> {
        Ok(DetectResult {
            detected: path.extension().is_some_and(|ext| ext == "demo"),
            format: String::from("demo"),
            reason: String::new(),
        })
    }

    fn ingest(&self, _path: &Path, _output_dir: &Path) -> Result<IngestResult, HandlerError> {
        Err(HandlerError::failed("disk full"))
    }

    fn enumerate(&self, _path: &Path) -> Result<EnumerateResult, HandlerError> {
        Ok(EnumerateResult {
            entries: vec![EnumerateEntry {
                path: String::from("a.txt"),
                size_bytes: 3,
                is_dir: false,
                metadata: BTreeMap::new(),
            }],
        })
    }
}

#[fixture]
fn registry() -> EmbeddedRegistry {
    let registry = EmbeddedRegistry::new();
    registry.register(EmbeddedPlugin::format(format_manifest("format.demo"), Partial));
    registry
}

#[rstest]
fn unregistered_id_is_distinct_from_failure(registry: EmbeddedRegistry) {
    let request = IpcRequest::format(FormatCommand::Detect).with_arg("path", "x.demo");
    assert_eq!(registry.dispatch("format.other", &request), EmbeddedDispatch::NotRegistered);
    assert!(registry.execute_embedded("format.other", &request).is_none());
}

#[rstest]
fn detect_dispatches_to_handler(registry: EmbeddedRegistry) {
    let request = IpcRequest::format(FormatCommand::Detect).with_arg("path", "book.demo");
    let response = registry
        .execute_embedded("format.demo", &request)
        .expect("embedded");
    assert!(response.is_ok());
    assert_eq!(response.result()["detected"], json!(true));
    assert_eq!(response.result()["format"], json!("demo"));
}

#[rstest]
fn handler_failure_is_completed_error(registry: EmbeddedRegistry) {
    let request = IpcRequest::format(FormatCommand::Ingest)
        .with_arg("path", "book.demo")
        .with_arg("output_dir", "out");
    let EmbeddedDispatch::Completed(response) = registry.dispatch("format.demo", &request) else {
        panic!("expected completed dispatch");
    };
    assert_eq!(response.error_message(), Some("disk full"));
}

#[rstest]
#[case(FormatCommand::ExtractIr, "extract-ir requires external plugin")]
#[case(FormatCommand::EmitNative, "emit-native requires external plugin")]
fn default_ir_operations_defer(
    registry: EmbeddedRegistry,
    #[case] command: FormatCommand,
    #[case] message: &str,
) {
    let request = IpcRequest::format(command)
        .with_arg("path", "book.demo")
        .with_arg("ir_path", "book.ir.json")
        .with_arg("output_dir", "out");
    let EmbeddedDispatch::Deferred(response) = registry.dispatch("format.demo", &request) else {
        panic!("expected deferred dispatch");
    };
    assert_eq!(response.error_message(), Some(message));
}

#[rstest]
#[case(IpcRequest::format(FormatCommand::Detect), "missing required argument 'path'")]
#[case(
    IpcRequest::format(FormatCommand::Ingest).with_arg("path", "a"),
    "missing required argument 'output_dir'"
)]
#[case(IpcRequest::new("frobnicate"), "unknown command 'frobnicate'")]
fn bad_requests_yield_error_responses(
    registry: EmbeddedRegistry,
    #[case] request: IpcRequest,
    #[case] message: &str,
) {
    let response = registry
        .execute_embedded("format.demo", &request)
        .expect("embedded");
    assert_eq!(response.error_message(), Some(message));
}

#[test]
fn emit_native_accepts_ir_path_argument() {
    let mut handler = MockFormatHandler::new();
    handler
        .expect_emit_native()
        .withf(|ir, out| ir == Path::new("doc.ir.json") && out == Path::new("out"))
        .times(1)
        .returning(|_, _| {
            Ok(EmitNativeResult {
                output_path: String::from("out/doc.demo"),
                format: String::from("demo"),
                loss_class: LossClass::L0,
                loss_report: Some(LossReport {
                    source_format: String::from("ir"),
                    target_format: String::from("demo"),
                    loss_class: LossClass::L0,
                    lost_elements: Vec::new(),
                    warnings: Vec::new(),
                }),
            })
        });

    let request = IpcRequest::format(FormatCommand::EmitNative)
        .with_arg("ir_path", "doc.ir.json")
        .with_arg("output_dir", "out");
    let value = dispatch_format(&handler, &request).expect("emit succeeds");
    assert_eq!(value["output_path"], json!("out/doc.demo"));
    assert_eq!(value["loss_class"], json!("L0"));
}

#[test]
fn tool_requests_pass_through_verbatim() {
    let mut handler = MockToolHandler::new();
    handler
        .expect_execute()
        .withf(|command, _| command == "lint")
        .times(1)
        .returning(|_, args| Ok(json!({ "echo": args.get("level").cloned() })));

    let registry = EmbeddedRegistry::new();
    registry.register(EmbeddedPlugin::tool(tool_manifest("tool.lint"), handler));

    let response = registry
        .execute_embedded("tool.lint", &IpcRequest::new("lint").with_arg("level", 3))
        .expect("embedded");
    assert_eq!(response.result(), &json!({ "echo": 3 }));
}

#[test]
fn tool_unimplemented_defers() {
    let mut handler = MockToolHandler::new();
    handler
        .expect_execute()
        .returning(|_, _| Err(HandlerError::unimplemented("needs binary")));
    let registry = EmbeddedRegistry::new();
    registry.register(EmbeddedPlugin::tool(tool_manifest("tool.x"), handler));

    assert!(matches!(
        registry.dispatch("tool.x", &IpcRequest::new("run")),
        EmbeddedDispatch::Deferred(_)
    ));
}

#[test]
fn reregistering_replaces_previous_entry() {
    let registry = EmbeddedRegistry::new();
    registry.register(EmbeddedPlugin::format(format_manifest("format.demo"), Partial));
    registry.register(EmbeddedPlugin::tool(tool_manifest("format.demo"), {
        let mut tool = MockToolHandler::new();
        tool.expect_execute().returning(|_, _| Ok(json!("tool")));
        tool
    }));

    assert_eq!(registry.len(), 1);
    let plugin = registry.get("format.demo").expect("registered");
    assert_eq!(plugin.handler().kind(), PluginKind::Tool);
}

#[test]
fn empty_id_is_ignored() {
    let registry = EmbeddedRegistry::new();
    registry.register(EmbeddedPlugin::format(format_manifest(""), Partial));
    assert!(registry.is_empty());
}

#[test]
fn padded_id_is_stored_verbatim() {
    let registry = EmbeddedRegistry::new();
    registry.register(EmbeddedPlugin::tool(tool_manifest(" tool.pad "), {
        let mut tool = MockToolHandler::new();
        tool.expect_execute().returning(|_, _| Ok(json!("padded")));
        tool
    }));

    assert!(registry.has(" tool.pad "));
    assert!(!registry.has("tool.pad"));
    let response = registry
        .execute_embedded(" tool.pad ", &IpcRequest::new("run"))
        .expect("registered under the manifest id");
    assert_eq!(response.result(), &json!("padded"));
}

#[test]
fn new_rejects_handler_of_other_kind() {
    let err = EmbeddedPlugin::new(tool_manifest("tool.x"), Handler::Format(Arc::new(Partial)))
        .expect_err("kind mismatch");
    assert!(err.to_string().contains("declares kind 'tool'"), "{err}");

    let plugin = EmbeddedPlugin::new(
        format_manifest("format.x"),
        Handler::Format(Arc::new(Partial)),
    )
    .expect("matching kind");
    assert_eq!(plugin.handler().kind(), PluginKind::Format);
}

#[test]
fn role_constructors_set_manifest_kind() {
    let plugin = EmbeddedPlugin::format(tool_manifest("format.x"), Partial);
    assert_eq!(plugin.manifest().plugin_kind(), Some(PluginKind::Format));
}

#[test]
fn concurrent_registration_and_dispatch() {
    let registry = EmbeddedRegistry::new();
    std::thread::scope(|scope| {
        for worker in 0..8 {
            let shared = registry.clone();
            scope.spawn(move || {
                let id = format!("format.worker{worker}");
                shared.register(EmbeddedPlugin::format(format_manifest(&id), Partial));
                for _ in 0..50 {
                    let request =
                        IpcRequest::format(FormatCommand::Detect).with_arg("path", "x.demo");
                    let response = shared.execute_embedded(&id, &request).expect("registered");
                    assert_eq!(response.result()["detected"], json!(true));
                    let _ = shared.list();
                }
            });
        }
    });
    assert_eq!(registry.len(), 8);
}

#[test]
fn clones_share_state_and_clear_empties() {
    let registry = EmbeddedRegistry::new();
    let clone = registry.clone();
    clone.register(EmbeddedPlugin::format(format_manifest("format.b"), Partial));
    registry.register(EmbeddedPlugin::format(format_manifest("format.a"), Partial));

    let ids: Vec<String> = registry
        .list()
        .iter()
        .map(|p| p.manifest().plugin_id().to_owned())
        .collect();
    assert_eq!(ids, ["format.a", "format.b"]);
    assert!(clone.has("format.a"));

    registry.clear();
    assert!(clone.is_empty());
}

#[test]
fn into_response_maps_both_arms() {
    assert!(into_response(Ok(json!(1))).is_ok());
    let failed = into_response(Err(HandlerError::unimplemented("later")));
    assert_eq!(failed.error_message(), Some("later"));
}
