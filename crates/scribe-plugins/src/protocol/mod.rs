//! IPC protocol types for host-plugin communication.
//!
//! One JSON object travels each way per invocation. The host writes an
//! [`IpcRequest`] to the plugin's stdin and closes it; the plugin writes an
//! [`IpcResponse`] to stdout and exits. Plugin stderr is captured for
//! diagnostics but is not part of the protocol. Embedded plugins receive and
//! return the same types, so callers cannot tell the two paths apart.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument and payload map carried by requests.
pub type Args = Map<String, Value>;

/// Well-known commands understood by every format plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatCommand {
    /// `detect {path}`
    Detect,
    /// `ingest {path, output_dir}`
    Ingest,
    /// `enumerate {path}`
    Enumerate,
    /// `extract-ir {path, output_dir}`
    ExtractIr,
    /// `emit-native {ir_path, output_dir}`
    EmitNative,
}

impl FormatCommand {
    /// Every well-known command.
    pub const ALL: [Self; 5] = [
        Self::Detect,
        Self::Ingest,
        Self::Enumerate,
        Self::ExtractIr,
        Self::EmitNative,
    ];

    /// Wire name of the command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::Ingest => "ingest",
            Self::Enumerate => "enumerate",
            Self::ExtractIr => "extract-ir",
            Self::EmitNative => "emit-native",
        }
    }

    /// Looks up a command by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.as_str() == name)
    }
}

impl std::fmt::Display for FormatCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request sent from the host to a plugin.
///
/// # Example
///
/// ```
/// use scribe_plugins::IpcRequest;
///
/// let request = IpcRequest::new("detect").with_arg("path", "/data/book.usfm");
/// assert_eq!(request.command(), "detect");
/// assert_eq!(request.arg_str("path"), Some("/data/book.usfm"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpcRequest {
    command: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    args: Args,
}

impl IpcRequest {
    /// Creates a request without arguments.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Args::new(),
        }
    }

    /// Creates a request for a well-known format command.
    #[must_use]
    pub fn format(command: FormatCommand) -> Self {
        Self::new(command.as_str())
    }

    /// Creates a request with an argument map.
    #[must_use]
    pub fn with_args(command: impl Into<String>, args: Args) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Adds one argument.
    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Command name.
    #[must_use]
    pub const fn command(&self) -> &str {
        self.command.as_str()
    }

    /// Argument map.
    #[must_use]
    pub const fn args(&self) -> &Args {
        &self.args
    }

    /// Looks up an argument.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Looks up a string argument.
    #[must_use]
    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.arg(name).and_then(Value::as_str)
    }
}

/// Outcome tag of an [`IpcResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The command succeeded; `result` holds the payload.
    Ok,
    /// The command failed; `error` holds the message.
    Error,
}

/// Response sent from a plugin to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpcResponse {
    status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    result: Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    error: String,
}

impl IpcResponse {
    /// Creates a successful response.
    #[must_use]
    pub const fn ok(result: Value) -> Self {
        Self {
            status: ResponseStatus::Ok,
            result,
            error: String::new(),
        }
    }

    /// Creates a failed response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            result: Value::Null,
            error: message.into(),
        }
    }

    /// Outcome tag.
    #[must_use]
    pub const fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Returns `true` for `ok` responses.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, ResponseStatus::Ok)
    }

    /// Result payload (`null` for failures).
    #[must_use]
    pub const fn result(&self) -> &Value {
        &self.result
    }

    /// Error message for failed responses.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self.status {
            ResponseStatus::Ok => None,
            ResponseStatus::Error => Some(self.error.as_str()),
        }
    }
}
