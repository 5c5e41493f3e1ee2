//! Transport Configuration
//!
//! Settings for the control connection to scamper: where it lives, how long
//! to wait when dialing, and how deep the internal queues are.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::endpoint::DaemonEndpoint;

/// Default depth of the command, line, result and error queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default number of unused `MORE` grants that can be banked
pub const DEFAULT_CREDIT_CAPACITY: usize = 100;

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// scamper control socket
    pub endpoint: DaemonEndpoint,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Capacity of each internal queue
    ///
    /// A full command queue blocks whoever is submitting, which is how
    /// scamper's pace propagates back to the caller.
    pub queue_capacity: usize,

    /// Maximum number of banked credits
    ///
    /// Grants received while the bank is full are dropped.
    pub credit_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: DaemonEndpoint::default(),
            connect_timeout_ms: 5000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            credit_capacity: DEFAULT_CREDIT_CAPACITY,
        }
    }
}

impl TransportConfig {
    /// Configuration for `endpoint` with default limits
    #[must_use]
    pub fn new(endpoint: DaemonEndpoint) -> Self {
        Self {
            endpoint,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SCURRY_ENDPOINT`: `tcp://host:port` or `unix:///path`
    /// - `SCURRY_CONNECT_TIMEOUT`: Connection timeout in ms
    /// - `SCURRY_QUEUE_CAPACITY`: Internal queue depth
    /// - `SCURRY_CREDIT_CAPACITY`: Maximum banked credits
    ///
    /// Unset or unparsable variables fall back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        crate::config::apply_transport_env(&mut config, &|key| std::env::var(key).ok());
        config
    }

    /// Connection timeout as a [`Duration`]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
