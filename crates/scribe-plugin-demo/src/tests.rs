//! Unit tests for the demo format plugin.

use std::io::Cursor;

use rstest::{fixture, rstest};
use scribe_plugins::{FormatCommand, PluginManifest};
use serde_json::json;
use tempfile::TempDir;

use super::*;

const SAMPLE: &str = "#DEMO\nintro line\n## Chapter one\nfirst\n## Chapter two\nsecond\n";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write sample");
        path
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }
}

#[fixture]
fn ws() -> Workspace {
    Workspace {
        dir: TempDir::new().expect("temp dir"),
    }
}

#[rstest]
#[case::extension("book.demo", "anything", true, "file extension")]
#[case::upper_extension("BOOK.DEMO", "anything", true, "file extension")]
#[case::header("book.txt", "#DEMO\nbody", true, "header")]
#[case::neither("book.txt", "plain text", false, "no demo extension or header")]
fn detect_recognises_demo_documents(
    ws: Workspace,
    #[case] name: &str,
    #[case] contents: &str,
    #[case] expected: bool,
    #[case] reason: &str,
) {
    let path = ws.file(name, contents);
    let result = DemoFormat::full().detect(&path).expect("detect");
    assert_eq!(result.detected, expected);
    assert_eq!(result.reason, reason);
}

#[rstest]
#[case::binary(b"\x89PNG\r\n\x1a\n\xff\xfe".as_slice(), false)]
#[case::header_then_binary(b"#DEMO\r\n\xff\xfe".as_slice(), true)]
fn detect_reads_header_bytes(ws: Workspace, #[case] contents: &[u8], #[case] expected: bool) {
    let path = ws.dir.path().join("image.bin");
    fs::write(&path, contents).expect("write sample");
    let result = DemoFormat::full().detect(&path).expect("detect");
    assert_eq!(result.detected, expected);
}

#[rstest]
fn detect_fails_for_missing_file(ws: Workspace) {
    let err = DemoFormat::full()
        .detect(&ws.dir.path().join("absent.txt"))
        .expect_err("missing");
    assert!(!err.is_unimplemented());
}

#[rstest]
fn ingest_stores_blob_by_digest(ws: Workspace) {
    let path = ws.file("abc.demo", "abc");
    let result = DemoFormat::embedded()
        .ingest(&path, &ws.out())
        .expect("ingest");

    let digest = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    assert_eq!(result.blob_sha256, digest);
    assert_eq!(result.size_bytes, 3);
    assert_eq!(result.artifact_id, format!("demo:{digest}"));
    assert_eq!(
        result.metadata.get("original_name").map(String::as_str),
        Some("abc.demo")
    );
    assert_eq!(fs::read(ws.out().join(digest)).expect("blob"), b"abc");
}

#[rstest]
fn enumerate_lists_sections(ws: Workspace) {
    let path = ws.file("book.demo", SAMPLE);
    let result = DemoFormat::embedded().enumerate(&path).expect("enumerate");
    let titles: Vec<&str> = result.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(titles, ["preamble", "Chapter one", "Chapter two"]);
    let total: u64 = result.entries.iter().map(|e| e.size_bytes).sum();
    assert_eq!(total, u64::try_from(SAMPLE.len()).expect("length fits"));
}

#[rstest]
fn ir_round_trip_is_byte_identical(ws: Workspace) {
    let path = ws.file("book.demo", SAMPLE);
    let handler = DemoFormat::full();

    let extracted = handler.extract_ir(&path, &ws.out()).expect("extract");
    assert_eq!(extracted.loss_class, LossClass::L0);
    assert!(extracted.ir_path.ends_with("book.ir.json"));

    let emitted = handler
        .emit_native(Path::new(&extracted.ir_path), &ws.dir.path().join("native"))
        .expect("emit");
    assert!(emitted.output_path.ends_with("book.demo"));
    assert_eq!(
        fs::read_to_string(&emitted.output_path).expect("emitted"),
        SAMPLE
    );
}

#[rstest]
fn emit_rejects_foreign_ir(ws: Workspace) {
    let ir = ws.file("x.ir.json", r#"{"format":"other","source_format":"demo","lines":[]}"#);
    let err = DemoFormat::full()
        .emit_native(&ir, &ws.out())
        .expect_err("foreign IR");
    assert_eq!(err.to_string(), "unsupported IR format 'other'");
}

#[rstest]
#[case(FormatCommand::ExtractIr)]
#[case(FormatCommand::EmitNative)]
fn embedded_variant_defers_ir(ws: Workspace, #[case] command: FormatCommand) {
    let path = ws.file("book.demo", SAMPLE);
    let request = IpcRequest::format(command)
        .with_arg("path", path.to_string_lossy().into_owned())
        .with_arg("ir_path", path.to_string_lossy().into_owned())
        .with_arg("output_dir", ws.out().to_string_lossy().into_owned());
    let err = dispatch_format(&DemoFormat::embedded(), &request).expect_err("deferred");
    assert!(err.is_unimplemented());
    assert!(err.to_string().ends_with("requires external plugin"));
}

#[test]
fn register_installs_ir_capable_manifest() {
    let registry = EmbeddedRegistry::new();
    register(&registry);
    let plugin = registry.get(DEMO_PLUGIN_ID).expect("registered");
    let manifest: &PluginManifest = plugin.manifest();
    assert_eq!(manifest.entrypoint(), DEMO_ENTRYPOINT);
    assert!(manifest.ir_support().is_some_and(IrSupport::is_capable));
}

fn run_with(input: &str) -> serde_json::Value {
    let mut reader = Cursor::new(input.as_bytes().to_vec());
    let mut output = Vec::new();
    run(&mut reader, &mut output).expect("run");
    serde_json::from_slice(&output).expect("response json")
}

#[rstest]
fn run_answers_detect(ws: Workspace) {
    let path = ws.file("book.demo", SAMPLE);
    let request = json!({"command": "detect", "args": {"path": path}});
    let response = run_with(&request.to_string());
    assert_eq!(response["status"], json!("ok"));
    assert_eq!(response["result"]["detected"], json!(true));
}

#[rstest]
#[case::empty("", "plugin request was empty")]
#[case::garbage("{nope", "invalid plugin request JSON")]
#[case::unknown_command(r#"{"command":"frobnicate"}"#, "unknown command 'frobnicate'")]
fn run_reports_bad_requests(#[case] input: &str, #[case] message: &str) {
    let response = run_with(input);
    assert_eq!(response["status"], json!("error"));
    let error = response["error"].as_str().expect("error message");
    assert!(error.starts_with(message), "unexpected error: {error}");
}
