//! Scamper Result Records
//!
//! scamper emits one JSON object per line in `attach format json` mode. Only
//! the fields the controller needs for correlation and a few common header
//! fields are modelled; everything else is kept verbatim in
//! [`ScamperResult::extra`] so callers can pick out probe-specific data.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Record types scamper emits for its own bookkeeping rather than for a probe
const HOUSEKEEPING_TYPES: &[&str] = &["cycle-start", "cycle-stop"];

/// Timestamp as scamper writes it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScamperTime {
    /// Seconds since the epoch
    pub sec: u64,
    /// Microseconds within the second
    pub usec: u64,
}

/// A decoded scamper result line
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScamperResult {
    /// Record type, e.g. `ping`, `trace`, `cycle-start`
    #[serde(rename = "type")]
    pub kind: String,
    /// scamper output format version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Probe method used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Source address of the probes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Destination address probed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    /// When the measurement started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<ScamperTime>,
    /// Correlation ID echoed from the `-U` flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userid: Option<u64>,
    /// Every other field, untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScamperResult {
    /// Decode a single result line
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] if the line is not a JSON object
    /// with a `type` field.
    pub fn from_json(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Whether this record is scamper bookkeeping that no task asked for
    #[must_use]
    pub fn is_housekeeping(&self) -> bool {
        HOUSEKEEPING_TYPES.contains(&self.kind.as_str())
    }
}
