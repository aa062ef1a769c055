//! Request routing between embedded handlers and external binaries.
//!
//! [`IpcExecutor::execute`] picks exactly one path per call:
//!
//! 1. An external plugin whose entrypoint exists runs externally when
//!    external plugins are enabled.
//! 2. Otherwise the embedded registry is consulted. A handler that defers
//!    with [`HandlerError::Unimplemented`](crate::embedded::HandlerError)
//!    falls back to the external binary if one exists and the context
//!    allows deferred execution.
//! 3. An id with no embedded handler falls back to the external binary if
//!    one exists.
//! 4. Anything else is [`PluginError::Unavailable`].

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::context::HostContext;
use crate::embedded::EmbeddedDispatch;
use crate::error::PluginError;
use crate::loader::PluginLoader;
use crate::manifest::Plugin;
use crate::process::{ProcessRunner, ProcessSpec, SubprocessRunner};
use crate::protocol::{IpcRequest, IpcResponse};

const EXECUTOR_TARGET: &str = "scribe_plugins::executor";

/// Executes plugin requests for a host.
///
/// # Example
///
/// ```
/// use scribe_plugins::{HostContext, IpcExecutor, IpcRequest, Plugin, PluginError, PluginKind, PluginManifest};
///
/// let context = HostContext::new();
/// let executor = IpcExecutor::new(&context);
/// let plugin = Plugin::embedded(PluginManifest::new("tool.x", "1.0.0", PluginKind::Tool, "x"));
///
/// let err = executor
///     .execute(&plugin, &IpcRequest::new("run"), None)
///     .expect_err("nothing can serve tool.x");
/// assert!(matches!(err, PluginError::Unavailable { .. }));
/// ```
#[derive(Debug, Clone)]
pub struct IpcExecutor<R = SubprocessRunner> {
    context: HostContext,
    runner: R,
}

impl IpcExecutor<SubprocessRunner> {
    /// Creates an executor that spawns real subprocesses.
    #[must_use]
    pub fn new(context: &HostContext) -> Self {
        Self::with_runner(context, SubprocessRunner)
    }
}

impl<R> IpcExecutor<R> {
    /// Creates an executor with a custom process runner.
    #[must_use]
    pub fn with_runner(context: &HostContext, runner: R) -> Self {
        Self {
            context: context.clone(),
            runner,
        }
    }

    /// Host context consulted on every call.
    #[must_use]
    pub const fn context(&self) -> &HostContext {
        &self.context
    }
}

impl<R: ProcessRunner> IpcExecutor<R> {
    /// Executes `request` against `plugin`.
    ///
    /// `timeout` bounds external execution; `None` uses the context's
    /// default.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Unavailable`] when neither path can serve the
    /// request, and any error raised by external execution. Embedded handler
    /// failures are returned as `error` responses, not errors.
    pub fn execute(
        &self,
        plugin: &Plugin,
        request: &IpcRequest,
        timeout: Option<Duration>,
    ) -> Result<IpcResponse, PluginError> {
        let has_binary = plugin.has_external_binary();
        let external_enabled = self.context.external_plugins_enabled();

        if has_binary && external_enabled {
            debug!(
                target: EXECUTOR_TARGET,
                plugin_id = plugin.id(),
                command = request.command(),
                "routing to external plugin"
            );
            return self.run_external(plugin, request, timeout);
        }

        match self.context.embedded().dispatch(plugin.id(), request) {
            EmbeddedDispatch::Completed(response) => Ok(response),
            EmbeddedDispatch::Deferred(response) => {
                if !has_binary {
                    return Ok(response);
                }
                if !external_enabled && !self.context.allow_deferred_external() {
                    warn!(
                        target: EXECUTOR_TARGET,
                        plugin_id = plugin.id(),
                        command = request.command(),
                        "embedded handler deferred but deferred external execution is disallowed"
                    );
                    return Ok(response);
                }
                info!(
                    target: EXECUTOR_TARGET,
                    plugin_id = plugin.id(),
                    command = request.command(),
                    reason = response.error_message().unwrap_or_default(),
                    "embedded handler deferred; falling back to external plugin"
                );
                self.run_external(plugin, request, timeout)
            }
            EmbeddedDispatch::NotRegistered if has_binary => {
                debug!(
                    target: EXECUTOR_TARGET,
                    plugin_id = plugin.id(),
                    "no embedded handler; falling back to external plugin"
                );
                self.run_external(plugin, request, timeout)
            }
            EmbeddedDispatch::NotRegistered => Err(PluginError::Unavailable {
                id: plugin.id().to_owned(),
            }),
        }
    }

    /// Resolves `id` through `loader` and executes `request` against it.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for unknown ids and otherwise the
    /// errors of [`Self::execute`].
    pub fn execute_by_id(
        &self,
        loader: &PluginLoader,
        id: &str,
        request: &IpcRequest,
        timeout: Option<Duration>,
    ) -> Result<IpcResponse, PluginError> {
        let plugin = loader.get(id)?;
        self.execute(&plugin, request, timeout)
    }

    fn run_external(
        &self,
        plugin: &Plugin,
        request: &IpcRequest,
        timeout: Option<Duration>,
    ) -> Result<IpcResponse, PluginError> {
        let deadline = timeout.unwrap_or_else(|| self.context.execution_timeout());
        let spec = ProcessSpec::for_plugin(plugin, &self.context.security_config(), deadline)?;
        self.runner.run(&spec, request)
    }
}
