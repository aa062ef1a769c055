//! Reference format plugin for `.demo` documents.
//!
//! A demo document is UTF-8 text, optionally opening with a `#DEMO` header
//! line, divided into sections by `## ` headings. The plugin works in two
//! modes:
//!
//! - **embedded**: [`register`] installs a [`DemoFormat`] that answers
//!   `detect`, `ingest` and `enumerate` in-process and defers IR conversion
//!   to the external binary;
//! - **external**: the `scribe-plugin-demo` binary answers every format
//!   command through [`run`], one request per invocation.
//!
//! The intermediate representation keeps every line verbatim, so both
//! conversions are lossless (`L0`).

#[cfg(test)]
mod tests;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use scribe_plugins::embedded::{dispatch_format, into_response};
use scribe_plugins::results::{
    DetectResult, EmitNativeResult, EnumerateEntry, EnumerateResult, ExtractIrResult,
    IngestResult, LossReport,
};
use scribe_plugins::{
    Capabilities, EmbeddedPlugin, EmbeddedRegistry, FormatHandler, HandlerError, IpcRequest,
    IpcResponse, IrSupport, LossClass, PluginKind, PluginManifest,
};

/// Identifier of the demo plugin.
pub const DEMO_PLUGIN_ID: &str = "format.demo";
/// Executable name inside the plugin directory.
pub const DEMO_ENTRYPOINT: &str = "demo-bin";
/// Optional first line marking a demo document.
pub const DEMO_HEADER: &str = "#DEMO";
/// File extension of demo documents.
pub const DEMO_EXTENSION: &str = "demo";

const FORMAT_NAME: &str = "demo";
const IR_FORMAT_NAME: &str = "scribe-ir";
const IR_SUFFIX: &str = ".ir.json";
const SECTION_PREFIX: &str = "## ";
const DEMO_TARGET: &str = "scribe_plugin_demo";

/// Errors raised while answering a protocol request.
#[derive(Debug, Error)]
pub enum DemoError {
    /// The request could not be read from stdin.
    #[error("failed to read plugin request: {source}")]
    Read {
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The response could not be written to stdout.
    #[error("failed to write plugin response: {source}")]
    Write {
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The response could not be serialised.
    #[error("failed to serialise plugin response: {source}")]
    Serialize {
        /// Underlying serialisation error.
        source: serde_json::Error,
    },
}

/// Manifest describing the demo plugin.
#[must_use]
pub fn manifest() -> PluginManifest {
    PluginManifest::new(
        DEMO_PLUGIN_ID,
        env!("CARGO_PKG_VERSION"),
        PluginKind::Format,
        DEMO_ENTRYPOINT,
    )
    .with_license("MIT")
    .with_capabilities(Capabilities {
        inputs: vec![String::from(FORMAT_NAME)],
        outputs: vec![String::from(FORMAT_NAME), String::from(IR_FORMAT_NAME)],
        profiles: Vec::new(),
    })
    .with_ir_support(IrSupport {
        can_extract: true,
        can_emit: true,
        loss_class: LossClass::L0.to_string(),
        formats: vec![String::from(FORMAT_NAME)],
    })
}

/// Registers the in-process variant of the plugin.
pub fn register(registry: &EmbeddedRegistry) {
    registry.register(EmbeddedPlugin::format(manifest(), DemoFormat::embedded()));
}

/// Demo document handler.
#[derive(Debug, Clone, Copy)]
pub struct DemoFormat {
    ir_conversion: bool,
}

impl DemoFormat {
    /// Handler used in-process: IR conversion defers to the binary.
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            ir_conversion: false,
        }
    }

    /// Handler used by the binary: every command is implemented.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            ir_conversion: true,
        }
    }

    fn require_ir(self, command: &str) -> Result<(), HandlerError> {
        if self.ir_conversion {
            Ok(())
        } else {
            Err(HandlerError::unimplemented(format!(
                "{command} requires external plugin"
            )))
        }
    }
}

/// Intermediate representation of a demo document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoIr {
    /// Always [`IR_FORMAT_NAME`].
    pub format: String,
    /// Native format the document came from.
    pub source_format: String,
    /// Document lines, split on `\n` so the text can be rebuilt exactly.
    pub lines: Vec<String>,
}

impl FormatHandler for DemoFormat {
    fn detect(&self, path: &Path) -> Result<DetectResult, HandlerError> {
        if has_demo_extension(path) {
            return Ok(detected("file extension"));
        }
        let mut first_line = Vec::new();
        fs::File::open(path)
            .map(io::BufReader::new)
            .and_then(|mut reader| reader.read_until(b'\n', &mut first_line))
            .map_err(|err| io_failure("read", path, &err))?;
        if first_line.trim_ascii_end() == DEMO_HEADER.as_bytes() {
            return Ok(detected("header"));
        }
        Ok(DetectResult {
            detected: false,
            format: String::new(),
            reason: String::from("no demo extension or header"),
        })
    }

    fn ingest(&self, path: &Path, output_dir: &Path) -> Result<IngestResult, HandlerError> {
        let bytes = fs::read(path).map_err(|err| io_failure("read", path, &err))?;
        let digest = format!("{:x}", Sha256::digest(&bytes));
        fs::create_dir_all(output_dir).map_err(|err| io_failure("create", output_dir, &err))?;
        let blob = output_dir.join(&digest);
        fs::write(&blob, &bytes).map_err(|err| io_failure("write", &blob, &err))?;
        debug!(target: DEMO_TARGET, blob = %blob.display(), "stored demo blob");

        let mut metadata = std::collections::BTreeMap::new();
        if let Some(name) = path.file_name() {
            metadata.insert(String::from("original_name"), name.to_string_lossy().into_owned());
        }
        Ok(IngestResult {
            artifact_id: format!("{FORMAT_NAME}:{digest}"),
            blob_sha256: digest,
            size_bytes: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            metadata,
        })
    }

    fn enumerate(&self, path: &Path) -> Result<EnumerateResult, HandlerError> {
        let text = read_text(path)?;
        Ok(EnumerateResult {
            entries: sections(&text)
                .into_iter()
                .map(|(title, size)| EnumerateEntry {
                    path: title,
                    size_bytes: size,
                    is_dir: false,
                    metadata: std::collections::BTreeMap::new(),
                })
                .collect(),
        })
    }

    fn extract_ir(&self, path: &Path, output_dir: &Path) -> Result<ExtractIrResult, HandlerError> {
        self.require_ir("extract-ir")?;
        let text = read_text(path)?;
        let ir = DemoIr {
            format: String::from(IR_FORMAT_NAME),
            source_format: String::from(FORMAT_NAME),
            lines: text.split('\n').map(str::to_owned).collect(),
        };
        let encoded = serde_json::to_vec_pretty(&ir)
            .map_err(|err| HandlerError::failed(format!("failed to encode IR: {err}")))?;

        fs::create_dir_all(output_dir).map_err(|err| io_failure("create", output_dir, &err))?;
        let ir_path = output_dir.join(format!("{}{IR_SUFFIX}", file_stem(path)));
        fs::write(&ir_path, encoded).map_err(|err| io_failure("write", &ir_path, &err))?;

        Ok(ExtractIrResult {
            ir_path: ir_path.to_string_lossy().into_owned(),
            loss_class: LossClass::L0,
            loss_report: Some(lossless(FORMAT_NAME, IR_FORMAT_NAME)),
        })
    }

    fn emit_native(
        &self,
        ir_path: &Path,
        output_dir: &Path,
    ) -> Result<EmitNativeResult, HandlerError> {
        self.require_ir("emit-native")?;
        let text = read_text(ir_path)?;
        let ir: DemoIr = serde_json::from_str(&text)
            .map_err(|err| HandlerError::failed(format!("invalid IR document: {err}")))?;
        if ir.format != IR_FORMAT_NAME {
            return Err(HandlerError::failed(format!(
                "unsupported IR format '{}'",
                ir.format
            )));
        }

        fs::create_dir_all(output_dir).map_err(|err| io_failure("create", output_dir, &err))?;
        let output_path = output_dir.join(native_name(ir_path));
        fs::write(&output_path, ir.lines.join("\n"))
            .map_err(|err| io_failure("write", &output_path, &err))?;

        Ok(EmitNativeResult {
            output_path: output_path.to_string_lossy().into_owned(),
            format: String::from(FORMAT_NAME),
            loss_class: LossClass::L0,
            loss_report: Some(lossless(IR_FORMAT_NAME, FORMAT_NAME)),
        })
    }
}

/// Answers one protocol request read from `stdin`.
///
/// Malformed requests produce an `error` response rather than a failure.
///
/// # Errors
///
/// Returns [`DemoError`] when stdin cannot be read or the response cannot be
/// written.
pub fn run(stdin: &mut impl BufRead, stdout: &mut impl Write) -> Result<(), DemoError> {
    let mut input = String::new();
    stdin
        .read_to_string(&mut input)
        .map_err(|source| DemoError::Read { source })?;

    let response = match parse_request(&input) {
        Ok(request) => {
            debug!(target: DEMO_TARGET, command = request.command(), "handling request");
            into_response(dispatch_format(&DemoFormat::full(), &request))
        }
        Err(message) => IpcResponse::error(message),
    };

    let payload =
        serde_json::to_string(&response).map_err(|source| DemoError::Serialize { source })?;
    stdout
        .write_all(payload.as_bytes())
        .and_then(|()| stdout.write_all(b"\n"))
        .and_then(|()| stdout.flush())
        .map_err(|source| DemoError::Write { source })
}

fn parse_request(input: &str) -> Result<IpcRequest, String> {
    let text = input.trim();
    if text.is_empty() {
        return Err(String::from("plugin request was empty"));
    }
    serde_json::from_str(text).map_err(|error| format!("invalid plugin request JSON: {error}"))
}

fn detected(reason: &str) -> DetectResult {
    DetectResult {
        detected: true,
        format: String::from(FORMAT_NAME),
        reason: String::from(reason),
    }
}

fn has_demo_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DEMO_EXTENSION))
}

fn read_text(path: &Path) -> Result<String, HandlerError> {
    fs::read_to_string(path).map_err(|err| io_failure("read", path, &err))
}

fn io_failure(action: &str, path: &Path, err: &io::Error) -> HandlerError {
    HandlerError::failed(format!("failed to {action} '{}': {err}", path.display()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| String::from("document"), |stem| stem.to_string_lossy().into_owned())
}

fn native_name(ir_path: &Path) -> PathBuf {
    let name = ir_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(IR_SUFFIX).map_or_else(|| file_stem(ir_path), str::to_owned);
    PathBuf::from(format!("{stem}.{DEMO_EXTENSION}"))
}

fn lossless(source: &str, target: &str) -> LossReport {
    LossReport {
        source_format: String::from(source),
        target_format: String::from(target),
        loss_class: LossClass::L0,
        lost_elements: Vec::new(),
        warnings: Vec::new(),
    }
}

/// Splits a document into `## ` sections, returning titles and byte sizes.
/// Text before the first heading, if any, is reported as `preamble`.
fn sections(text: &str) -> Vec<(String, u64)> {
    let mut sections: Vec<(String, u64)> = Vec::new();
    for line in text.split_inclusive('\n') {
        let size = u64::try_from(line.len()).unwrap_or(u64::MAX);
        if let Some(title) = line.trim_end().strip_prefix(SECTION_PREFIX) {
            sections.push((title.trim().to_owned(), size));
        } else if let Some((_, total)) = sections.last_mut() {
            *total += size;
        } else if !line.trim().is_empty() {
            sections.push((String::from("preamble"), size));
        }
    }
    sections
}
