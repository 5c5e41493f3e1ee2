//! Error Types
//!
//! Connection-level failures are the only errors that reach callers of the
//! controller. Everything that can go wrong with a single protocol line is
//! described by [`ProtocolError`], logged where it happens, and dropped.

use thiserror::Error;

/// Errors raised while establishing or driving the control connection
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint string could not be understood
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint as given
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },

    /// Dialing the daemon failed
    #[error("Failed to connect to {endpoint}: {source}")]
    ConnectionFailed {
        /// Endpoint that was dialed
        endpoint: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Dialing the daemon did not complete in time
    #[error("Timed out connecting to {endpoint} after {timeout_ms}ms")]
    ConnectTimeout {
        /// Endpoint that was dialed
        endpoint: String,
        /// Configured connect timeout
        timeout_ms: u64,
    },

    /// The endpoint's transport is not available on this platform
    #[error("Transport not supported on this platform: {0}")]
    UnsupportedTransport(String),

    /// I/O failure on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-line protocol failures
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A result line was not valid JSON for a scamper result
    #[error("Failed to decode result: {0}")]
    Decode(#[from] serde_json::Error),

    /// A `DATA` announcement did not carry a byte count
    #[error("Malformed DATA announcement: '{0}'")]
    MalformedDataLength(String),
}

/// Errors surfaced by the [`Controller`](crate::controller::Controller)
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The control connection could not be established
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The submission queue no longer accepts tasks
    #[error("Controller is no longer accepting tasks")]
    Closed,
}

/// A task value that would not render as a single command-line word
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Invalid {field} {value:?}: must be one non-empty word without control characters")]
pub struct InvalidTaskError {
    /// Which part of the task was rejected
    pub field: &'static str,
    /// The rejected value
    pub value: String,
}

/// An enumerated name did not match any known value
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("'{value}' is not a valid {kind} (expected one of: {expected})")]
pub struct NameParseError {
    /// Which enumeration was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
    /// Comma-separated list of accepted names
    pub expected: String,
}

impl NameParseError {
    /// Build an error for `value` given the accepted `names`
    pub(crate) fn new(kind: &'static str, value: &str, names: &[&str]) -> Self {
        Self {
            kind,
            value: value.to_string(),
            expected: names.join(", "),
        }
    }
}
