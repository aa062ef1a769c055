//! Log output formats understood by [`crate::HostConfig`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How telemetry renders events on stderr.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened.
    #[default]
    Json,
    /// Single-line human-readable events, used by plugin binaries.
    Compact,
}

/// Error returned when text names no [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;
