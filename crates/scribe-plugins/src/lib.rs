//! Plugin host runtime for Scribe.
//!
//! The `scribe-plugins` crate discovers, validates, loads and executes
//! plugins. A plugin is described by a `plugin.json` manifest and runs either
//! in-process, as an [`embedded`] handler compiled into the host, or as an
//! external executable speaking a one-shot JSON protocol over standard I/O.
//!
//! # Architecture
//!
//! - [`discovery`] walks a plugin root in flat or kind-nested layout and
//!   parses every manifest it finds.
//! - [`PluginLoader`] keeps the table of usable plugins, seeded with the
//!   embedded registry and filtered by host-version compatibility
//!   ([`version`]).
//! - [`IpcExecutor`] routes each request to the embedded handler or the
//!   external binary, and runs external plugins through the [`process`]
//!   module under a deadline.
//! - [`security`] guards every path that is about to be executed.
//! - [`HostContext`] carries the state shared by all of the above.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use scribe_plugins::{FormatCommand, HostContext, IpcExecutor, IpcRequest, PluginLoader};
//! use scribe_plugins::results::parse_detect_result;
//!
//! # fn main() -> Result<(), scribe_plugins::PluginError> {
//! let context = HostContext::new();
//! context.enable_external_plugins();
//!
//! let loader = PluginLoader::new(&context);
//! loader.load_from_directory(Path::new("plugins"))?;
//!
//! let executor = IpcExecutor::new(&context);
//! let request = IpcRequest::format(FormatCommand::Detect).with_arg("path", "book.demo");
//! let response = executor.execute_by_id(&loader, "format.demo", &request, None)?;
//! let detected = parse_detect_result(&response)?;
//! println!("detected: {}", detected.detected);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod discovery;
pub mod embedded;
pub mod error;
pub mod executor;
pub mod loader;
pub mod manifest;
pub mod process;
pub mod protocol;
pub mod results;
pub mod security;
pub mod telemetry;
pub mod version;

#[cfg(test)]
mod tests;

pub use self::context::{HOST_VERSION, HostContext};
pub use self::embedded::{
    EmbeddedDispatch, EmbeddedPlugin, EmbeddedRegistry, FormatHandler, Handler, HandlerError,
    ToolHandler,
};
pub use self::error::PluginError;
pub use self::executor::IpcExecutor;
pub use self::loader::PluginLoader;
pub use self::manifest::{
    Capabilities, IrSupport, LossClass, MANIFEST_FILE_NAME, Plugin, PluginKind, PluginLocation,
    PluginManifest,
};
pub use self::process::{ProcessRunner, ProcessSpec, SubprocessRunner};
pub use self::protocol::{FormatCommand, IpcRequest, IpcResponse, ResponseStatus};
pub use self::version::{Constraint, ConstraintOp, ConstraintSet, Version, VersionError};
