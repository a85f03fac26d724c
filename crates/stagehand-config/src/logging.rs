//! Rendering choices for orchestrator log lines.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log events are written to stderr.
///
/// Parsing ignores ASCII case, so `JSON` and `json` name the same format.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened into the top level.
    #[default]
    Json,
    /// Terse single-line text for operators watching a deployment.
    Compact,
    /// Multi-line text with source locations, for local debugging.
    Pretty,
}

impl LogFormat {
    /// Whether events are emitted as machine-readable records.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Failure to read a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
