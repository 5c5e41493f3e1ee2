//! TOML Configuration File Support
//!
//! Loads controller settings from `~/.config/scurry/scurry.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/scurry/scurry.toml` (typically `~/.config/scurry/scurry.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [transport]
//! endpoint = "unix:///var/run/scamper.sock"
//! connect_timeout_ms = 5000
//! queue_capacity = 100
//! credit_capacity = 100
//!
//! [controller]
//! task_queue_capacity = 100
//! result_queue_capacity = 100
//! shutdown_linger_secs = 60
//! ```
//!
//! # Environment Variables
//!
//! | Variable                  | Setting                          |
//! |---------------------------|----------------------------------|
//! | `SCURRY_ENDPOINT`         | `transport.endpoint`             |
//! | `SCURRY_CONNECT_TIMEOUT`  | `transport.connect_timeout_ms`   |
//! | `SCURRY_QUEUE_CAPACITY`   | `transport.queue_capacity`       |
//! | `SCURRY_CREDIT_CAPACITY`  | `transport.credit_capacity`      |
//! | `SCURRY_LINGER_SECS`      | `controller.shutdown_linger_secs`|

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::ControllerConfig;
use crate::transport::{DaemonEndpoint, TransportConfig};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Transport section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportToml {
    /// scamper control socket, `tcp://host:port` or `unix:///path`
    pub endpoint: Option<DaemonEndpoint>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Depth of the attachment's queues
    pub queue_capacity: Option<usize>,

    /// Maximum banked `MORE` credits
    pub credit_capacity: Option<usize>,
}

/// Controller section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerToml {
    /// Depth of the submission queue
    pub task_queue_capacity: Option<usize>,

    /// Depth of the delivered-task queue
    pub result_queue_capacity: Option<usize>,

    /// Seconds to wait for outstanding results after draining
    pub shutdown_linger_secs: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScurryToml {
    /// Transport configuration section
    pub transport: TransportToml,

    /// Controller configuration section
    pub controller: ControllerToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Configuration assembled from every source
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct ScurryConfig {
    /// Controller configuration, transport included
    pub controller: ControllerConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ScurryConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ScurryConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Transport part of the configuration
    #[must_use]
    pub fn transport(&self) -> &TransportConfig {
        &self.controller.transport
    }

    /// Check that every queue can hold at least one item
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first zero capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let transport = &self.controller.transport;
        let capacities = [
            ("transport.queue_capacity", transport.queue_capacity),
            ("transport.credit_capacity", transport.credit_capacity),
            ("controller.task_queue_capacity", self.controller.task_queue_capacity),
            ("controller.result_queue_capacity", self.controller.result_queue_capacity),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/scurry/scurry.toml` or
/// `~/.config/scurry/scurry.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("scurry").join("scurry.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the result fails [`ScurryConfig::validate`]. A missing config file is not
/// an error (defaults are used).
pub fn load_config() -> Result<ScurryConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ScurryConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ScurryConfig, ConfigError> {
    // Start with defaults
    let mut config = ScurryConfig::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ScurryToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    if apply_controller_env(&mut config.controller, &env) {
        config.source = ConfigSource::Env;
    }

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ScurryConfig, toml: &ScurryToml) {
    let transport = &mut config.controller.transport;
    if let Some(ref endpoint) = toml.transport.endpoint {
        transport.endpoint = endpoint.clone();
    }
    if let Some(timeout) = toml.transport.connect_timeout_ms {
        transport.connect_timeout_ms = timeout;
    }
    if let Some(capacity) = toml.transport.queue_capacity {
        transport.queue_capacity = capacity;
    }
    if let Some(capacity) = toml.transport.credit_capacity {
        transport.credit_capacity = capacity;
    }

    let controller = &mut config.controller;
    if let Some(capacity) = toml.controller.task_queue_capacity {
        controller.task_queue_capacity = capacity;
    }
    if let Some(capacity) = toml.controller.result_queue_capacity {
        controller.result_queue_capacity = capacity;
    }
    if let Some(secs) = toml.controller.shutdown_linger_secs {
        controller.set_linger(Duration::from_secs(secs));
    }
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment variable");
            None
        }
    }
}

/// Apply transport environment overrides, returning whether any applied
pub(crate) fn apply_transport_env(
    config: &mut TransportConfig,
    env: &impl Fn(&str) -> Option<String>,
) -> bool {
    let mut applied = false;

    if let Some(endpoint) = parse_env::<DaemonEndpoint>(env, "SCURRY_ENDPOINT") {
        config.endpoint = endpoint;
        applied = true;
    }
    if let Some(ms) = parse_env::<u64>(env, "SCURRY_CONNECT_TIMEOUT") {
        config.connect_timeout_ms = ms;
        applied = true;
    }
    if let Some(n) = parse_env::<usize>(env, "SCURRY_QUEUE_CAPACITY") {
        config.queue_capacity = n;
        applied = true;
    }
    if let Some(n) = parse_env::<usize>(env, "SCURRY_CREDIT_CAPACITY") {
        config.credit_capacity = n;
        applied = true;
    }

    applied
}

/// Apply controller environment overrides, returning whether any applied
pub(crate) fn apply_controller_env(
    config: &mut ControllerConfig,
    env: &impl Fn(&str) -> Option<String>,
) -> bool {
    let mut applied = apply_transport_env(&mut config.transport, env);

    if let Some(secs) = parse_env::<u64>(env, "SCURRY_LINGER_SECS") {
        config.set_linger(Duration::from_secs(secs));
        applied = true;
    }

    applied
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub endpoint: Option<DaemonEndpoint>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,

    /// Shutdown linger override (seconds)
    pub linger_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint override
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: DaemonEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Set shutdown linger override
    #[must_use]
    pub fn with_linger_secs(mut self, secs: u64) -> Self {
        self.linger_secs = Some(secs);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ScurryConfig) {
        if self.endpoint.is_some() || self.connect_timeout_ms.is_some() || self.linger_secs.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref endpoint) = self.endpoint {
            config.controller.transport.endpoint = endpoint.clone();
        }

        if let Some(timeout) = self.connect_timeout_ms {
            config.controller.transport.connect_timeout_ms = timeout;
        }

        if let Some(secs) = self.linger_secs {
            config.controller.set_linger(Duration::from_secs(secs));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
