//! Controller Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::{TransportConfig, DEFAULT_QUEUE_CAPACITY};

/// Default time to wait for outstanding results after draining
pub const DEFAULT_SHUTDOWN_LINGER: Duration = Duration::from_secs(60);

/// Controller configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Control connection settings
    pub transport: TransportConfig,

    /// Capacity of the submission queue
    pub task_queue_capacity: usize,

    /// Capacity of the delivered-task queue
    pub result_queue_capacity: usize,

    /// How long to keep collecting results after draining, in milliseconds
    pub shutdown_linger_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            task_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            result_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_linger_ms: DEFAULT_SHUTDOWN_LINGER.as_millis() as u64,
        }
    }
}

impl ControllerConfig {
    /// Configuration for `transport` with default controller settings
    #[must_use]
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Reads everything [`TransportConfig::from_env`] does, plus
    /// `SCURRY_LINGER_SECS`. Unset or unparsable variables fall back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        crate::config::apply_controller_env(&mut config, &|key| std::env::var(key).ok());
        config
    }

    /// Set the shutdown linger
    #[must_use]
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.set_linger(linger);
        self
    }

    /// Replace the shutdown linger
    pub fn set_linger(&mut self, linger: Duration) {
        self.shutdown_linger_ms = u64::try_from(linger.as_millis()).unwrap_or(u64::MAX);
    }

    /// Shutdown linger as a [`Duration`]
    #[must_use]
    pub fn shutdown_linger(&self) -> Duration {
        Duration::from_millis(self.shutdown_linger_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_config_default() {
        let config = ControllerConfig::default();
        assert_eq!(config.shutdown_linger(), Duration::from_secs(60));
        assert_eq!(config.task_queue_capacity, 100);
        assert_eq!(config.result_queue_capacity, 100);
    }

    #[test]
    fn test_with_linger() {
        let config = ControllerConfig::default().with_linger(Duration::from_millis(250));
        assert_eq!(config.shutdown_linger_ms, 250);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ControllerConfig = toml::from_str("shutdown_linger_ms = 1500").unwrap();
        assert_eq!(config.shutdown_linger(), Duration::from_millis(1500));
        assert_eq!(config.transport, TransportConfig::default());
    }
}
