//! Plugin manifest types describing plugin identity and capabilities.
//!
//! A [`PluginManifest`] is the declarative JSON description stored as
//! `plugin.json` in every plugin directory. Four fields are required and must
//! be non-empty: `plugin_id`, `version`, `kind` and `entrypoint`. Everything
//! else is optional and advisory. A [`Plugin`] pairs a validated manifest with
//! its [`PluginLocation`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

pub use scribe_config::MANIFEST_FILE_NAME;

/// Category tags recognised by the host.
///
/// Manifests may carry other tags; they load normally unless
/// `restrict_to_known_kinds` is set, but only registered kinds are scanned as
/// kind directories during discovery.
///
/// # Example
///
/// ```
/// use scribe_plugins::PluginKind;
///
/// assert_eq!(PluginKind::Format.as_str(), "format");
/// assert_eq!("tool".parse::<PluginKind>().ok(), Some(PluginKind::Tool));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    /// Converts a document format to and from the intermediate representation.
    Format,
    /// Exposes free-form commands.
    Tool,
}

/// Every kind the host recognises.
pub const REGISTERED_KINDS: [PluginKind; 2] = [PluginKind::Format, PluginKind::Tool];

impl PluginKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Tool => "tool",
        }
    }

    /// Looks up a registered kind by tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        REGISTERED_KINDS.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Returns `true` if `tag` names a registered kind.
    #[must_use]
    pub fn is_registered(tag: &str) -> bool {
        Self::from_tag(tag).is_some()
    }
}

impl FromStr for PluginKind {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| PluginError::manifest(format!("unknown plugin kind '{s}'")))
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PluginKind> for String {
    fn from(kind: PluginKind) -> Self {
        kind.as_str().to_owned()
    }
}

/// Fidelity rating for an intermediate-representation conversion.
///
/// `L0` is lossless; `L4` discards most structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LossClass {
    /// Byte-identical round trip.
    L0,
    /// Semantically lossless.
    L1,
    /// Minor formatting loss.
    L2,
    /// Structural loss.
    L3,
    /// Text-only survival.
    L4,
}

impl LossClass {
    /// Returns the canonical tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L0 => "L0",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::L4 => "L4",
        }
    }

    /// Parses a tag such as `L2`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        [Self::L0, Self::L1, Self::L2, Self::L3, Self::L4]
            .into_iter()
            .find(|class| class.as_str() == tag)
    }
}

impl std::fmt::Display for LossClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared input, output and profile tags. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Accepted inputs.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Produced outputs.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Supported profiles.
    #[serde(default)]
    pub profiles: Vec<String>,
}

/// Intermediate-representation support declared by a format plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrSupport {
    /// Whether `extract-ir` is implemented.
    #[serde(default)]
    pub can_extract: bool,
    /// Whether `emit-native` is implemented.
    #[serde(default)]
    pub can_emit: bool,
    /// Declared fidelity tag (`L0`..`L4`).
    #[serde(default)]
    pub loss_class: String,
    /// Formats covered by the conversion.
    #[serde(default)]
    pub formats: Vec<String>,
}

impl IrSupport {
    /// Returns `true` when either direction is supported.
    #[must_use]
    pub const fn is_capable(&self) -> bool {
        self.can_extract || self.can_emit
    }

    /// Parsed loss class, if the tag is recognised.
    #[must_use]
    pub fn loss_class(&self) -> Option<LossClass> {
        LossClass::from_tag(&self.loss_class)
    }
}

/// Declarative description of a plugin's identity and capabilities.
///
/// # Example
///
/// ```
/// use scribe_plugins::{PluginKind, PluginManifest};
///
/// let manifest = PluginManifest::from_json(
///     r#"{"plugin_id":"format.demo","version":"1.0.0","kind":"format","entrypoint":"demo-bin"}"#,
/// )
/// .expect("valid manifest");
///
/// assert_eq!(manifest.plugin_id(), "format.demo");
/// assert_eq!(manifest.plugin_kind(), Some(PluginKind::Format));
/// assert!(manifest.min_host_version().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    plugin_id: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    entrypoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_host_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    license: Option<String>,
    #[serde(default)]
    capabilities: Capabilities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ir_support: Option<IrSupport>,
}

impl PluginManifest {
    /// Creates a manifest with the four required fields.
    #[must_use]
    pub fn new(
        plugin_id: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        entrypoint: impl Into<String>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            version: version.into(),
            kind: kind.into(),
            entrypoint: entrypoint.into(),
            min_host_version: None,
            license: None,
            capabilities: Capabilities::default(),
            ir_support: None,
        }
    }

    /// Parses and validates a manifest document.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] when the document is not a JSON
    /// object of the expected shape or a required field is missing.
    pub fn from_json(text: &str) -> Result<Self, PluginError> {
        let manifest: Self = serde_json::from_str(text)
            .map_err(|err| PluginError::manifest(format!("invalid manifest JSON: {err}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads, parses and validates a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ManifestMissing`] when the file does not exist,
    /// [`PluginError::Io`] when it cannot be read, and
    /// [`PluginError::Manifest`] when it is malformed.
    pub fn from_path(path: &Path) -> Result<Self, PluginError> {
        let text = fs::read_to_string(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => PluginError::ManifestMissing {
                path: path.to_path_buf(),
            },
            _ => PluginError::io(path, err),
        })?;
        Self::from_json(&text).map_err(|err| match err {
            PluginError::Manifest { message } => {
                PluginError::manifest(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Sets the minimum host version.
    #[must_use]
    pub fn with_min_host_version(mut self, version: impl Into<String>) -> Self {
        self.min_host_version = Some(version.into());
        self
    }

    /// Sets the licence string.
    #[must_use]
    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    /// Declares capability tags.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Replaces the plugin kind.
    #[must_use]
    pub(crate) fn with_kind(mut self, kind: PluginKind) -> Self {
        self.kind = kind.into();
        self
    }

    /// Declares intermediate-representation support.
    #[must_use]
    pub fn with_ir_support(mut self, ir_support: IrSupport) -> Self {
        self.ir_support = Some(ir_support);
        self
    }

    /// Checks that every required field is present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] naming the first missing field.
    pub fn validate(&self) -> Result<(), PluginError> {
        let required = [
            ("plugin_id", &self.plugin_id),
            ("version", &self.version),
            ("kind", &self.kind),
            ("entrypoint", &self.entrypoint),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PluginError::manifest(format!(
                    "missing required field '{field}'"
                )));
            }
        }
        Ok(())
    }

    /// Globally unique plugin identifier.
    #[must_use]
    pub const fn plugin_id(&self) -> &str {
        self.plugin_id.as_str()
    }

    /// Version of the plugin itself.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Raw kind tag.
    #[must_use]
    pub const fn kind(&self) -> &str {
        self.kind.as_str()
    }

    /// Kind tag resolved against the registered kinds.
    #[must_use]
    pub fn plugin_kind(&self) -> Option<PluginKind> {
        PluginKind::from_tag(&self.kind)
    }

    /// Entrypoint path relative to the plugin directory.
    #[must_use]
    pub const fn entrypoint(&self) -> &str {
        self.entrypoint.as_str()
    }

    /// Minimum host version, if declared.
    #[must_use]
    pub fn min_host_version(&self) -> Option<&str> {
        self.min_host_version.as_deref()
    }

    /// Licence string, if declared.
    #[must_use]
    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    /// Declared capability tags.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Declared IR support.
    #[must_use]
    pub const fn ir_support(&self) -> Option<&IrSupport> {
        self.ir_support.as_ref()
    }
}

/// Where a plugin's implementation lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginLocation {
    /// Compiled into this process.
    Embedded,
    /// An external plugin directory; the entrypoint resolves against it.
    Directory(PathBuf),
}

/// A resolved, loadable plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    manifest: PluginManifest,
    location: PluginLocation,
}

impl Plugin {
    /// Creates a plugin resident in this process.
    #[must_use]
    pub const fn embedded(manifest: PluginManifest) -> Self {
        Self {
            manifest,
            location: PluginLocation::Embedded,
        }
    }

    /// Creates a plugin backed by an external directory.
    #[must_use]
    pub fn external(manifest: PluginManifest, directory: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            location: PluginLocation::Directory(directory.into()),
        }
    }

    /// Plugin identifier.
    #[must_use]
    pub const fn id(&self) -> &str {
        self.manifest.plugin_id()
    }

    /// Plugin manifest.
    #[must_use]
    pub const fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Plugin location.
    #[must_use]
    pub const fn location(&self) -> &PluginLocation {
        &self.location
    }

    /// Plugin directory for external plugins.
    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        match &self.location {
            PluginLocation::Embedded => None,
            PluginLocation::Directory(dir) => Some(dir.as_path()),
        }
    }

    /// Returns `true` for plugins resident in this process.
    #[must_use]
    pub const fn is_embedded(&self) -> bool {
        matches!(self.location, PluginLocation::Embedded)
    }

    /// Joins the plugin directory with the entrypoint without any checks.
    ///
    /// Use [`crate::security::secure_entrypoint_path`] when the result is
    /// going to be executed.
    #[must_use]
    pub fn entrypoint_path(&self) -> Option<PathBuf> {
        self.directory()
            .map(|dir| dir.join(self.manifest.entrypoint()))
    }

    /// Returns `true` when the entrypoint exists as a file on disk.
    #[must_use]
    pub fn has_external_binary(&self) -> bool {
        self.entrypoint_path().is_some_and(|path| path.is_file())
    }

    /// Returns `true` when the manifest declares IR support.
    #[must_use]
    pub fn is_ir_capable(&self) -> bool {
        self.manifest.ir_support().is_some_and(IrSupport::is_capable)
    }
}
