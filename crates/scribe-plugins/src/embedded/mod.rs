//! In-process plugin implementations.
//!
//! An [`EmbeddedPlugin`] pairs a manifest with exactly one [`Handler`]: a
//! [`FormatHandler`] answering the five well-known format commands, or a
//! [`ToolHandler`] accepting arbitrary commands. Plugins register into an
//! [`EmbeddedRegistry`] keyed by `plugin_id`; re-registering an id replaces
//! the previous entry.
//!
//! Handler failures never escape as Rust errors from dispatch. They become
//! `error`-status [`IpcResponse`]s, mirroring what an external plugin would
//! write, and [`HandlerError::Unimplemented`] additionally marks the response
//! as deferred so the executor may try an external binary instead.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::PluginError;
use crate::manifest::{PluginKind, PluginManifest};
use crate::protocol::{Args, FormatCommand, IpcRequest, IpcResponse};
use crate::results::{
    DetectResult, EmitNativeResult, EnumerateResult, ExtractIrResult, IngestResult,
};

const EMBEDDED_TARGET: &str = "scribe_plugins::embedded";

/// Failure raised by an embedded handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The handler does not implement this operation in-process; an external
    /// implementation may.
    #[error("{message}")]
    Unimplemented {
        /// Explanation forwarded to the caller.
        message: String,
    },
    /// The operation failed.
    #[error("{message}")]
    Failed {
        /// Explanation forwarded to the caller.
        message: String,
    },
}

impl HandlerError {
    /// Creates a deferral to an external implementation.
    #[must_use]
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::Unimplemented {
            message: message.into(),
        }
    }

    /// Creates an ordinary failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Returns `true` for deferrals.
    #[must_use]
    pub const fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented { .. })
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::failed(err.to_string())
    }
}

/// In-process implementation of the format commands.
///
/// IR conversion defaults to deferring to an external plugin.
#[cfg_attr(test, mockall::automock)]
pub trait FormatHandler: Send + Sync {
    /// Reports whether `path` is in this plugin's format.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the input cannot be inspected.
    fn detect(&self, path: &Path) -> Result<DetectResult, HandlerError>;

    /// Stores `path` byte-for-byte under `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the input cannot be stored.
    fn ingest(&self, path: &Path, output_dir: &Path) -> Result<IngestResult, HandlerError>;

    /// Lists the entries contained in `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the input cannot be read.
    fn enumerate(&self, path: &Path) -> Result<EnumerateResult, HandlerError>;

    /// Converts `path` to the intermediate representation.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Unimplemented`] unless overridden.
    fn extract_ir(
        &self,
        _path: &Path,
        _output_dir: &Path,
    ) -> Result<ExtractIrResult, HandlerError> {
        Err(HandlerError::unimplemented(
            "extract-ir requires external plugin",
        ))
    }

    /// Converts an IR document back to the native format.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Unimplemented`] unless overridden.
    fn emit_native(
        &self,
        _ir_path: &Path,
        _output_dir: &Path,
    ) -> Result<EmitNativeResult, HandlerError> {
        Err(HandlerError::unimplemented(
            "emit-native requires external plugin",
        ))
    }
}

/// In-process implementation of a tool plugin.
#[cfg_attr(test, mockall::automock)]
pub trait ToolHandler: Send + Sync {
    /// Runs `command` with plugin-defined `args`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the command fails or is unknown.
    fn execute(&self, command: &str, args: &Args) -> Result<Value, HandlerError>;
}

/// The capability set an embedded plugin exposes.
#[derive(Clone)]
pub enum Handler {
    /// Answers the well-known format commands.
    Format(Arc<dyn FormatHandler>),
    /// Answers free-form commands.
    Tool(Arc<dyn ToolHandler>),
}

impl Handler {
    /// Kind of plugin this handler serves.
    #[must_use]
    pub const fn kind(&self) -> PluginKind {
        match self {
            Self::Format(_) => PluginKind::Format,
            Self::Tool(_) => PluginKind::Tool,
        }
    }

    /// Routes a request to the handler.
    ///
    /// # Errors
    ///
    /// Returns the handler's [`HandlerError`], or
    /// [`HandlerError::Failed`] for unknown format commands and missing
    /// arguments.
    pub fn dispatch(&self, request: &IpcRequest) -> Result<Value, HandlerError> {
        match self {
            Self::Format(handler) => dispatch_format(handler.as_ref(), request),
            Self::Tool(handler) => dispatch_tool(handler.as_ref(), request),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.kind()).finish()
    }
}

/// Routes a request through the five-way format command table.
///
/// # Errors
///
/// Returns the handler's [`HandlerError`], or [`HandlerError::Failed`] when
/// the command is unknown or a required argument is missing.
pub fn dispatch_format(
    handler: &dyn FormatHandler,
    request: &IpcRequest,
) -> Result<Value, HandlerError> {
    let Some(command) = FormatCommand::from_name(request.command()) else {
        return Err(HandlerError::failed(format!(
            "unknown command '{}'",
            request.command()
        )));
    };

    match command {
        FormatCommand::Detect => to_value(handler.detect(&path_arg(request, "path")?)?),
        FormatCommand::Ingest => to_value(handler.ingest(
            &path_arg(request, "path")?,
            &path_arg(request, "output_dir")?,
        )?),
        FormatCommand::Enumerate => to_value(handler.enumerate(&path_arg(request, "path")?)?),
        FormatCommand::ExtractIr => to_value(handler.extract_ir(
            &path_arg(request, "path")?,
            &path_arg(request, "output_dir")?,
        )?),
        FormatCommand::EmitNative => {
            let ir_path = path_arg(request, "ir_path").or_else(|_| path_arg(request, "path"))?;
            to_value(handler.emit_native(&ir_path, &path_arg(request, "output_dir")?)?)
        }
    }
}

/// Forwards a request verbatim to a tool handler.
///
/// # Errors
///
/// Returns the handler's [`HandlerError`].
pub fn dispatch_tool(handler: &dyn ToolHandler, request: &IpcRequest) -> Result<Value, HandlerError> {
    handler.execute(request.command(), request.args())
}

/// Converts a dispatch outcome into a wire response.
#[must_use]
pub fn into_response(outcome: Result<Value, HandlerError>) -> IpcResponse {
    match outcome {
        Ok(value) => IpcResponse::ok(value),
        Err(err) => IpcResponse::error(err.to_string()),
    }
}

fn path_arg(request: &IpcRequest, name: &str) -> Result<PathBuf, HandlerError> {
    match request.arg_str(name) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => Err(HandlerError::failed(format!(
            "missing required argument '{name}'"
        ))),
    }
}

fn to_value(result: impl Serialize) -> Result<Value, HandlerError> {
    serde_json::to_value(result)
        .map_err(|err| HandlerError::failed(format!("failed to encode result: {err}")))
}

/// A plugin compiled into the host process.
#[derive(Debug, Clone)]
pub struct EmbeddedPlugin {
    manifest: PluginManifest,
    handler: Handler,
}

impl EmbeddedPlugin {
    /// Creates an embedded plugin from a manifest and handler.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] when the manifest `kind` does not
    /// name the handler's role.
    pub fn new(manifest: PluginManifest, handler: Handler) -> Result<Self, PluginError> {
        if manifest.plugin_kind() != Some(handler.kind()) {
            return Err(PluginError::manifest(format!(
                "plugin '{}' declares kind '{}' but provides a {} handler",
                manifest.plugin_id(),
                manifest.kind(),
                handler.kind(),
            )));
        }
        Ok(Self { manifest, handler })
    }

    /// Creates an embedded format plugin. The manifest kind is set to
    /// `format`.
    #[must_use]
    pub fn format(manifest: PluginManifest, handler: impl FormatHandler + 'static) -> Self {
        Self {
            manifest: manifest.with_kind(PluginKind::Format),
            handler: Handler::Format(Arc::new(handler)),
        }
    }

    /// Creates an embedded tool plugin. The manifest kind is set to `tool`.
    #[must_use]
    pub fn tool(manifest: PluginManifest, handler: impl ToolHandler + 'static) -> Self {
        Self {
            manifest: manifest.with_kind(PluginKind::Tool),
            handler: Handler::Tool(Arc::new(handler)),
        }
    }

    /// Plugin manifest.
    #[must_use]
    pub const fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Plugin handler.
    #[must_use]
    pub const fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// Result of routing a request to the embedded registry.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedDispatch {
    /// No embedded plugin is registered under the id.
    NotRegistered,
    /// The handler produced a response (success or failure).
    Completed(IpcResponse),
    /// The handler declined the operation in favour of an external
    /// implementation. The response carries its explanation.
    Deferred(IpcResponse),
}

impl EmbeddedDispatch {
    /// The response, if a handler ran.
    #[must_use]
    pub fn into_response(self) -> Option<IpcResponse> {
        match self {
            Self::NotRegistered => None,
            Self::Completed(response) | Self::Deferred(response) => Some(response),
        }
    }
}

/// Shared table of in-process plugins.
///
/// Clones share the same table.
///
/// # Example
///
/// ```
/// use scribe_plugins::embedded::{EmbeddedPlugin, EmbeddedRegistry, HandlerError, ToolHandler};
/// use scribe_plugins::protocol::Args;
/// use scribe_plugins::{IpcRequest, PluginKind, PluginManifest};
///
/// struct Echo;
///
/// impl ToolHandler for Echo {
///     fn execute(&self, command: &str, _args: &Args) -> Result<serde_json::Value, HandlerError> {
///         Ok(serde_json::Value::String(command.to_owned()))
///     }
/// }
///
/// let registry = EmbeddedRegistry::new();
/// let manifest = PluginManifest::new("tool.echo", "1.0.0", PluginKind::Tool, "echo");
/// registry.register(EmbeddedPlugin::tool(manifest, Echo));
///
/// let response = registry
///     .execute_embedded("tool.echo", &IpcRequest::new("ping"))
///     .expect("registered");
/// assert_eq!(response.result(), "ping");
/// assert!(registry.execute_embedded("tool.other", &IpcRequest::new("ping")).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedRegistry {
    plugins: Arc<RwLock<HashMap<String, EmbeddedPlugin>>>,
}

impl EmbeddedRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin, replacing any previous entry with the same id.
    ///
    /// Plugins with a blank `plugin_id` are ignored. Other ids are stored
    /// exactly as the manifest spells them.
    pub fn register(&self, plugin: EmbeddedPlugin) {
        let id = plugin.manifest().plugin_id().to_owned();
        if id.trim().is_empty() {
            debug!(target: EMBEDDED_TARGET, "ignoring embedded plugin without plugin_id");
            return;
        }
        debug!(target: EMBEDDED_TARGET, plugin_id = %id, "registering embedded plugin");
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, plugin);
    }

    /// Looks up a plugin by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<EmbeddedPlugin> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Snapshot of every registered plugin, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<EmbeddedPlugin> {
        let mut plugins: Vec<EmbeddedPlugin> = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        plugins.sort_by(|a, b| a.manifest().plugin_id().cmp(b.manifest().plugin_id()));
        plugins
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every plugin. Intended for test isolation.
    pub fn clear(&self) {
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Routes a request to the plugin registered under `id`.
    #[must_use]
    pub fn dispatch(&self, id: &str, request: &IpcRequest) -> EmbeddedDispatch {
        let Some(plugin) = self.get(id) else {
            return EmbeddedDispatch::NotRegistered;
        };

        debug!(
            target: EMBEDDED_TARGET,
            plugin_id = id,
            command = request.command(),
            "dispatching embedded request"
        );
        match plugin.handler().dispatch(request) {
            Ok(value) => EmbeddedDispatch::Completed(IpcResponse::ok(value)),
            Err(err @ HandlerError::Unimplemented { .. }) => {
                EmbeddedDispatch::Deferred(IpcResponse::error(err.to_string()))
            }
            Err(err @ HandlerError::Failed { .. }) => {
                EmbeddedDispatch::Completed(IpcResponse::error(err.to_string()))
            }
        }
    }

    /// Runs a request in-process.
    ///
    /// Returns `None` when `id` is not an embedded plugin, which is distinct
    /// from an embedded plugin that failed (an `error` response).
    #[must_use]
    pub fn execute_embedded(&self, id: &str, request: &IpcRequest) -> Option<IpcResponse> {
        self.dispatch(id, request).into_response()
    }
}

#[cfg(test)]
mod tests;
