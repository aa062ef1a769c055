//! External plugin execution over standard input and output.
//!
//! [`SubprocessRunner`] implements [`ProcessRunner`] by spawning the plugin
//! entrypoint with its directory as the working directory, writing the
//! request as one JSON line to stdin, and collecting stdout and stderr on
//! separate threads while the parent polls for exit against a deadline. A
//! child that outlives the deadline is killed and reaped.

use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use scribe_config::SecurityConfig;
use tracing::{debug, warn};

use crate::error::PluginError;
use crate::manifest::Plugin;
use crate::protocol::{IpcRequest, IpcResponse};
use crate::security::secure_entrypoint_path;

/// Tracing target for plugin process operations.
const PROCESS_TARGET: &str = "scribe_plugins::process";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Everything needed to launch one external plugin invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    plugin_id: String,
    program: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ProcessSpec {
    /// Builds a spec for `plugin`, resolving its entrypoint through the
    /// security checks.
    ///
    /// # Errors
    ///
    /// Returns any error raised by [`secure_entrypoint_path`].
    pub fn for_plugin(
        plugin: &Plugin,
        security: &SecurityConfig,
        timeout: Duration,
    ) -> Result<Self, PluginError> {
        let program = secure_entrypoint_path(security, plugin)?;
        let working_dir = plugin
            .directory()
            .or_else(|| program.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self {
            plugin_id: plugin.id().to_owned(),
            program,
            working_dir,
            timeout,
        })
    }

    /// Plugin identifier, used in errors and logs.
    #[must_use]
    pub const fn plugin_id(&self) -> &str {
        self.plugin_id.as_str()
    }

    /// Executable to spawn.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Working directory of the child.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Deadline for the whole invocation.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Runs one request against an external plugin.
///
/// Test code implements this trait to stand in for real subprocesses.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessRunner: Send + Sync {
    /// Sends `request` to the process described by `spec` and returns its
    /// response.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] if the process cannot be spawned, times
    /// out, exits with a non-zero status, or writes an invalid response.
    fn run(&self, spec: &ProcessSpec, request: &IpcRequest) -> Result<IpcResponse, PluginError>;
}

/// Runs plugins as child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubprocessRunner;

impl ProcessRunner for SubprocessRunner {
    fn run(&self, spec: &ProcessSpec, request: &IpcRequest) -> Result<IpcResponse, PluginError> {
        let mut payload = serde_json::to_vec(request).map_err(PluginError::SerializeRequest)?;
        payload.push(b'\n');

        debug!(
            target: PROCESS_TARGET,
            plugin_id = spec.plugin_id(),
            program = %spec.program().display(),
            command = request.command(),
            "spawning plugin process"
        );

        let child = Command::new(spec.program())
            .current_dir(spec.working_dir())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| PluginError::SpawnFailed {
                id: spec.plugin_id().to_owned(),
                message: err.to_string(),
                source: Some(Arc::new(err)),
            })?;
        let mut guard = ChildGuard::new(child);

        let stdout_reader = collect(spec, guard.child.stdout.take(), "stdout")?;
        let stderr_reader = collect(spec, guard.child.stderr.take(), "stderr")?;
        let stdin = guard.child.stdin.take().ok_or_else(|| missing_pipe(spec, "stdin"))?;
        let writer = write_request(stdin, payload);

        let status = wait_for_exit(spec, &mut guard)?;

        join_writer(spec, writer)?;
        let stdout = join_reader(spec, stdout_reader)?;
        let stderr = String::from_utf8_lossy(&join_reader(spec, stderr_reader)?).into_owned();

        if !status.success() {
            return Err(PluginError::NonZeroExit {
                id: spec.plugin_id().to_owned(),
                status: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_owned(),
            });
        }
        if !stderr.trim().is_empty() {
            debug!(
                target: PROCESS_TARGET,
                plugin_id = spec.plugin_id(),
                stderr = %stderr.trim(),
                "plugin stderr output"
            );
        }
        parse_response(spec, &stdout)
    }
}

/// Kills and reaps the child unless it has already been waited on.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    const fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn kill(&mut self) {
        drop(self.child.kill());
        drop(self.child.wait());
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill();
        }
    }
}

fn missing_pipe(spec: &ProcessSpec, pipe: &str) -> PluginError {
    PluginError::SpawnFailed {
        id: spec.plugin_id().to_owned(),
        message: format!("failed to capture {pipe}"),
        source: None,
    }
}

fn collect(
    spec: &ProcessSpec,
    pipe: Option<impl Read + Send + 'static>,
    name: &str,
) -> Result<JoinHandle<io::Result<Vec<u8>>>, PluginError> {
    let mut pipe = pipe.ok_or_else(|| missing_pipe(spec, name))?;
    Ok(thread::spawn(move || {
        let mut buffer = Vec::new();
        pipe.read_to_end(&mut buffer)?;
        Ok(buffer)
    }))
}

/// Writes the request and closes stdin. A plugin that exits without reading
/// its input is not an error here; its exit status decides the outcome.
fn write_request(mut stdin: ChildStdin, payload: Vec<u8>) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || match stdin.write_all(&payload).and_then(|()| stdin.flush()) {
        Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
        other => other,
    })
}

fn wait_for_exit(spec: &ProcessSpec, guard: &mut ChildGuard) -> Result<ExitStatus, PluginError> {
    // A timeout past the clock's range leaves the run unbounded.
    let deadline = Instant::now().checked_add(spec.timeout());
    loop {
        match guard.child.try_wait() {
            Ok(Some(status)) => {
                guard.reaped = true;
                debug!(
                    target: PROCESS_TARGET,
                    plugin_id = spec.plugin_id(),
                    ?status,
                    "plugin process exited"
                );
                return Ok(status);
            }
            Ok(None) if deadline.is_some_and(|limit| Instant::now() >= limit) => {
                warn!(
                    target: PROCESS_TARGET,
                    plugin_id = spec.plugin_id(),
                    timeout_ms = u64::try_from(spec.timeout().as_millis()).unwrap_or(u64::MAX),
                    "plugin timed out, killing process"
                );
                guard.kill();
                return Err(PluginError::Timeout {
                    id: spec.plugin_id().to_owned(),
                    timeout: spec.timeout(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => return Err(PluginError::io(spec.program(), err)),
        }
    }
}

fn join_writer(spec: &ProcessSpec, writer: JoinHandle<io::Result<()>>) -> Result<(), PluginError> {
    match writer.join() {
        Ok(result) => result.map_err(|err| PluginError::io(spec.program(), err)),
        Err(_) => Err(thread_panicked(spec, "stdin")),
    }
}

fn join_reader(
    spec: &ProcessSpec,
    reader: JoinHandle<io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, PluginError> {
    match reader.join() {
        Ok(result) => result.map_err(|err| PluginError::io(spec.program(), err)),
        Err(_) => Err(thread_panicked(spec, "output")),
    }
}

fn thread_panicked(spec: &ProcessSpec, pipe: &str) -> PluginError {
    PluginError::SpawnFailed {
        id: spec.plugin_id().to_owned(),
        message: format!("{pipe} pipe handler panicked"),
        source: None,
    }
}

fn parse_response(spec: &ProcessSpec, stdout: &[u8]) -> Result<IpcResponse, PluginError> {
    let raw = String::from_utf8_lossy(stdout);
    let text = raw.trim();
    if text.is_empty() {
        return Err(PluginError::DeserializeResponse {
            id: spec.plugin_id().to_owned(),
            message: String::from("plugin produced no output on stdout"),
            raw: String::new(),
        });
    }
    serde_json::from_str(text).map_err(|err| PluginError::DeserializeResponse {
        id: spec.plugin_id().to_owned(),
        message: err.to_string(),
        raw: text.to_owned(),
    })
}
