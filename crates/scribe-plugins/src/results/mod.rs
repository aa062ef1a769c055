//! Typed results for the well-known format commands.
//!
//! Responses carry an untyped JSON `result`. The `parse_*` accessors turn a
//! response into the typed result for one command: they fail on an `error`
//! status, then re-encode the payload and decode it into the expected shape
//! so wrong field types surface as [`PluginError::ResultShape`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PluginError;
use crate::manifest::LossClass;
use crate::protocol::IpcResponse;

/// Result payloads that can be decoded from a response.
pub trait TypedResult: DeserializeOwned {
    /// Name used in shape-mismatch errors.
    const NAME: &'static str;
}

/// Outcome of `detect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectResult {
    /// Whether the plugin recognises the input.
    pub detected: bool,
    /// Recognised format name.
    #[serde(default)]
    pub format: String,
    /// Human-readable explanation.
    #[serde(default)]
    pub reason: String,
}

/// Outcome of `ingest`: the input stored byte-for-byte as a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    /// Identifier of the stored artifact.
    pub artifact_id: String,
    /// SHA-256 of the stored bytes, lowercase hex.
    pub blob_sha256: String,
    /// Size of the stored bytes.
    pub size_bytes: u64,
    /// Format-specific metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// One entry listed by `enumerate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerateEntry {
    /// Entry path within the container.
    pub path: String,
    /// Entry size.
    pub size_bytes: u64,
    /// Whether the entry is a directory.
    #[serde(default)]
    pub is_dir: bool,
    /// Format-specific metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Outcome of `enumerate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerateResult {
    /// Listed entries.
    pub entries: Vec<EnumerateEntry>,
}

/// Description of an execution engine a plugin relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSpecResult {
    /// Engine identifier.
    pub engine_id: String,
    /// Engine category.
    #[serde(rename = "type")]
    pub engine_type: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Packages the engine needs.
    #[serde(default)]
    pub packages: Vec<String>,
}

/// One element dropped during a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostElement {
    /// Location of the element.
    pub path: String,
    /// Element type.
    pub element_type: String,
    /// Why it was dropped.
    #[serde(default)]
    pub reason: String,
}

/// Fidelity report attached to IR conversions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossReport {
    /// Format converted from.
    pub source_format: String,
    /// Format converted to.
    pub target_format: String,
    /// Overall fidelity.
    pub loss_class: LossClass,
    /// Elements that did not survive.
    #[serde(default)]
    pub lost_elements: Vec<LostElement>,
    /// Non-fatal warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Outcome of `extract-ir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractIrResult {
    /// Written IR document.
    pub ir_path: String,
    /// Fidelity of the extraction.
    pub loss_class: LossClass,
    /// Detailed loss report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_report: Option<LossReport>,
}

/// Outcome of `emit-native`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitNativeResult {
    /// Written native document.
    pub output_path: String,
    /// Native format name.
    pub format: String,
    /// Fidelity of the emission.
    pub loss_class: LossClass,
    /// Detailed loss report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_report: Option<LossReport>,
}

impl TypedResult for DetectResult {
    const NAME: &'static str = "detect";
}

impl TypedResult for IngestResult {
    const NAME: &'static str = "ingest";
}

impl TypedResult for EnumerateResult {
    const NAME: &'static str = "enumerate";
}

impl TypedResult for EngineSpecResult {
    const NAME: &'static str = "engine-spec";
}

impl TypedResult for ExtractIrResult {
    const NAME: &'static str = "extract-ir";
}

impl TypedResult for EmitNativeResult {
    const NAME: &'static str = "emit-native";
}

/// Decodes a response into `T`.
///
/// # Errors
///
/// Returns [`PluginError::PluginReported`] for `error` responses and
/// [`PluginError::ResultShape`] when the payload does not decode into `T`.
pub fn parse_result<T: TypedResult>(response: &IpcResponse) -> Result<T, PluginError> {
    if let Some(message) = response.error_message() {
        return Err(PluginError::PluginReported {
            message: message.to_owned(),
        });
    }
    let encoded = serde_json::to_vec(response.result()).map_err(|err| PluginError::ResultShape {
        expected: T::NAME,
        message: format!("result could not be re-encoded: {err}"),
    })?;
    serde_json::from_slice(&encoded).map_err(|err| PluginError::ResultShape {
        expected: T::NAME,
        message: err.to_string(),
    })
}

/// Decodes a `detect` response.
///
/// # Errors
///
/// See [`parse_result`].
pub fn parse_detect_result(response: &IpcResponse) -> Result<DetectResult, PluginError> {
    parse_result(response)
}

/// Decodes an `ingest` response.
///
/// # Errors
///
/// See [`parse_result`].
pub fn parse_ingest_result(response: &IpcResponse) -> Result<IngestResult, PluginError> {
    parse_result(response)
}

/// Decodes an `enumerate` response.
///
/// # Errors
///
/// See [`parse_result`].
pub fn parse_enumerate_result(response: &IpcResponse) -> Result<EnumerateResult, PluginError> {
    parse_result(response)
}

/// Decodes an engine specification response.
///
/// # Errors
///
/// See [`parse_result`].
pub fn parse_engine_spec_result(response: &IpcResponse) -> Result<EngineSpecResult, PluginError> {
    parse_result(response)
}

/// Decodes an `extract-ir` response.
///
/// # Errors
///
/// See [`parse_result`].
pub fn parse_extract_ir_result(response: &IpcResponse) -> Result<ExtractIrResult, PluginError> {
    parse_result(response)
}

/// Decodes an `emit-native` response.
///
/// # Errors
///
/// See [`parse_result`].
pub fn parse_emit_native_result(response: &IpcResponse) -> Result<EmitNativeResult, PluginError> {
    parse_result(response)
}
