//! Measurement Types
//!
//! A [`Task`] is both the request a caller hands to the controller and the
//! envelope it gets back. The probe kind is carried by the [`ProbeOptions`]
//! variant, and each variant knows how to render its own options into the
//! fragment of a scamper command line.
//!
//! # Command Syntax
//!
//! ```text
//! <kind> -U <correlation-id> <options> <target>
//! ping -U 7 -c 3 -P icmp-echo 8.8.8.8
//! ```

mod flags;
mod names;
mod ping;
mod trace;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InvalidTaskError, NameParseError};
use crate::result::ScamperResult;

pub use ping::{PingMethod, PingOptions};
pub use trace::{TraceMethod, TraceOptions};

/// Kind of probe scamper should run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum ProbeKind {
    /// ICMP/TCP/UDP echo-style reachability probe
    Ping,
    /// Hop-by-hop path discovery
    Trace,
}

impl ProbeKind {
    /// Name table, shared by parsing, display and serde
    pub const NAMES: &'static [(Self, &'static str)] = &[(Self::Ping, "ping"), (Self::Trace, "trace")];

    /// Every probe kind, in table order
    #[must_use]
    pub fn all() -> impl Iterator<Item = Self> {
        Self::NAMES.iter().map(|(kind, _)| *kind)
    }

    /// The scamper command name for this kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        names::name_of(Self::NAMES, self)
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeKind {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        names::parse(Self::NAMES, "probe kind", s)
    }
}

impl From<ProbeKind> for &'static str {
    fn from(kind: ProbeKind) -> Self {
        kind.as_str()
    }
}

impl TryFrom<String> for ProbeKind {
    type Error = NameParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Kind-specific probe parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum ProbeOptions {
    /// Options for a `ping` command
    Ping(PingOptions),
    /// Options for a `trace` command
    Trace(TraceOptions),
}

impl ProbeOptions {
    /// Default options for `kind`
    #[must_use]
    pub fn for_kind(kind: ProbeKind) -> Self {
        match kind {
            ProbeKind::Ping => Self::Ping(PingOptions::default()),
            ProbeKind::Trace => Self::Trace(TraceOptions::default()),
        }
    }

    /// The probe kind these options belong to
    #[must_use]
    pub fn kind(&self) -> ProbeKind {
        match self {
            Self::Ping(_) => ProbeKind::Ping,
            Self::Trace(_) => ProbeKind::Trace,
        }
    }

    /// Render the options as command-line flags (may be empty)
    #[must_use]
    pub fn command_fragment(&self) -> String {
        match self {
            Self::Ping(opts) => opts.command_fragment(),
            Self::Trace(opts) => opts.command_fragment(),
        }
    }

    /// Check that the options render as whole command-line words
    ///
    /// # Errors
    ///
    /// Returns the first free-text option that would break the command line.
    pub fn validate(&self) -> Result<(), InvalidTaskError> {
        match self {
            Self::Ping(opts) => opts.validate(),
            Self::Trace(opts) => opts.validate(),
        }
    }
}

/// Where a task is in its lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Built by the caller, not yet handed to the controller
    #[default]
    Pending,
    /// Assigned an ID and sent (or queued for sending) to scamper
    InFlight,
    /// A matching result has been attached
    Resolved,
    /// Given up on without a result
    Abandoned,
}

impl TaskState {
    /// Whether the task has been delivered for the last time
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Abandoned)
    }
}

/// A measurement request and, once delivered, its outcome
///
/// Only `target` and `probe` need to be filled in by the caller. The
/// controller overwrites `correlation_id` and `state` when it sends the
/// task, so any values set beforehand are ignored.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Task {
    /// Probe kind and its options
    #[serde(flatten)]
    pub probe: ProbeOptions,
    /// Host name or address to measure towards
    pub target: String,
    /// ID echoed back by scamper as `userid`
    pub correlation_id: Option<u64>,
    /// Lifecycle state
    pub state: TaskState,
    /// Decoded result, present once resolved
    pub result: Option<ScamperResult>,
}

impl Task {
    /// Create a pending task
    pub fn new(target: impl Into<String>, probe: ProbeOptions) -> Self {
        Self {
            probe,
            target: target.into(),
            correlation_id: None,
            state: TaskState::Pending,
            result: None,
        }
    }

    /// Create a pending ping task
    pub fn ping(target: impl Into<String>, options: PingOptions) -> Self {
        Self::new(target, ProbeOptions::Ping(options))
    }

    /// Create a pending traceroute task
    pub fn trace(target: impl Into<String>, options: TraceOptions) -> Self {
        Self::new(target, ProbeOptions::Trace(options))
    }

    /// Probe kind of this task
    #[must_use]
    pub fn kind(&self) -> ProbeKind {
        self.probe.kind()
    }

    /// Whether the task was given up on
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.state == TaskState::Abandoned
    }

    /// Check that the task renders as exactly one command line
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTaskError`] if the target or a free-text option is
    /// empty or contains whitespace or control characters.
    pub fn validate(&self) -> Result<(), InvalidTaskError> {
        flags::check_word("target", &self.target)?;
        self.probe.validate()
    }

    /// Render the scamper command for this task under `correlation_id`
    #[must_use]
    pub fn command_for(&self, correlation_id: u64) -> String {
        let id = correlation_id.to_string();
        let fragment = self.probe.command_fragment();
        [self.kind().as_str(), "-U", id.as_str(), fragment.as_str(), self.target.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Serialize the task as a single JSON line
    ///
    /// # Errors
    ///
    /// Returns an error if a result field cannot be represented as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.correlation_id {
            Some(id) => write!(f, "{} {} (id {id}, {:?})", self.kind(), self.target, self.state),
            None => write!(f, "{} {} ({:?})", self.kind(), self.target, self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_probe_kind_names() {
        assert_eq!("ping".parse::<ProbeKind>().unwrap(), ProbeKind::Ping);
        assert_eq!("trace".parse::<ProbeKind>().unwrap(), ProbeKind::Trace);
        assert_eq!(ProbeKind::Trace.to_string(), "trace");
        names::assert_bijective(ProbeKind::NAMES);
    }

    #[test]
    fn test_probe_kind_unknown_name() {
        let err = "traceroute".parse::<ProbeKind>().unwrap_err();
        assert_eq!(err.kind, "probe kind");
        assert_eq!(err.value, "traceroute");
    }

    #[test]
    fn test_probe_kind_serde_uses_name_table() {
        let json = serde_json::to_string(&ProbeKind::Ping).unwrap();
        assert_eq!(json, "\"ping\"");
        let kind: ProbeKind = serde_json::from_str("\"trace\"").unwrap();
        assert_eq!(kind, ProbeKind::Trace);
        assert!(serde_json::from_str::<ProbeKind>("\"dns\"").is_err());
    }

    #[test]
    fn test_ping_command_with_default_options() {
        let task = Task::ping("8.8.8.8", PingOptions::default());
        assert_eq!(task.command_for(1), "ping -U 1 8.8.8.8");
    }

    #[test]
    fn test_ping_command_with_options() {
        let options = PingOptions {
            probe_count: Some(3),
            method: Some(PingMethod::TcpSyn),
            ..PingOptions::default()
        };
        let task = Task::ping("8.8.8.8", options);
        let command = task.command_for(42);
        assert!(command.starts_with("ping -U 42 "));
        assert!(command.ends_with(" 8.8.8.8"));
        assert!(command.contains("-c 3"));
        assert!(command.contains("-P tcp-syn"));
        assert!(!command.contains("  "));
    }

    #[test]
    fn test_trace_command() {
        let options = TraceOptions {
            max_ttl: Some(16),
            ..TraceOptions::default()
        };
        let task = Task::trace("192.0.2.1", options);
        assert_eq!(task.command_for(9), "trace -U 9 -m 16 192.0.2.1");
    }

    #[test]
    fn test_task_new_is_pending() {
        let task = Task::trace("example.com", TraceOptions::default());
        assert_eq!(task.kind(), ProbeKind::Trace);
        assert_eq!(task.state, TaskState::Pending);
        assert!(task.correlation_id.is_none());
        assert!(task.result.is_none());
        assert!(!task.state.is_terminal());
    }

    #[test]
    fn test_task_json_shape() {
        let mut task = Task::ping("8.8.8.8", PingOptions::default());
        task.correlation_id = Some(5);
        task.state = TaskState::Abandoned;

        let value: serde_json::Value = serde_json::from_str(&task.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "ping");
        assert_eq!(value["target"], "8.8.8.8");
        assert_eq!(value["correlation_id"], 5);
        assert_eq!(value["state"], "abandoned");
        assert!(value["result"].is_null());
    }

    #[test]
    fn test_validate_task() {
        assert!(Task::ping("192.0.2.1", PingOptions::default()).validate().is_ok());

        let err = Task::ping("", PingOptions::default()).validate().unwrap_err();
        assert_eq!(err.field, "target");

        let options = PingOptions {
            pattern: Some("ff\r\nshutdown".into()),
            ..Default::default()
        };
        let err = Task::ping("192.0.2.1", options).validate().unwrap_err();
        assert_eq!(err.field, "pattern");

        let options = TraceOptions {
            src_addr: Some(String::new()),
            ..Default::default()
        };
        let err = Task::trace("192.0.2.1", options).validate().unwrap_err();
        assert_eq!(err.field, "source address");
    }

    #[test]
    fn test_options_for_kind() {
        for kind in ProbeKind::all() {
            assert_eq!(ProbeOptions::for_kind(kind).kind(), kind);
        }
    }
}
