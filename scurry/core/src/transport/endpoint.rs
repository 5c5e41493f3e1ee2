//! Daemon Endpoints
//!
//! scamper listens either on a TCP port (`scamper -P 31337`) or on a Unix
//! domain socket (`scamper -U /path`). The transport is picked from an
//! explicit URI scheme rather than by guessing from the address text:
//!
//! - `tcp://127.0.0.1:31337`
//! - `unix:///var/run/scamper.sock`

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TransportError;

/// Where to find the scamper control socket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DaemonEndpoint {
    /// TCP control port
    Tcp {
        /// Host name or address
        host: String,
        /// Port number
        port: u16,
    },
    /// Unix domain control socket
    Unix {
        /// Socket file path
        path: PathBuf,
    },
}

impl DaemonEndpoint {
    /// Build a TCP endpoint
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Build a Unix socket endpoint
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Socket path when this is a Unix endpoint
    #[must_use]
    pub fn unix_path(&self) -> Option<&Path> {
        match self {
            Self::Unix { path } => Some(path),
            Self::Tcp { .. } => None,
        }
    }

    fn invalid(input: &str, reason: impl Into<String>) -> TransportError {
        TransportError::InvalidEndpoint {
            endpoint: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl Default for DaemonEndpoint {
    fn default() -> Self {
        Self::tcp("127.0.0.1", 31337)
    }
}

impl fmt::Display for DaemonEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

impl FromStr for DaemonEndpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input).map_err(|e| Self::invalid(input, e.to_string()))?;
        match url.scheme() {
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| Self::invalid(input, "missing host"))?
                    .trim_start_matches('[')
                    .trim_end_matches(']');
                let port = url
                    .port()
                    .ok_or_else(|| Self::invalid(input, "missing port"))?;
                Ok(Self::tcp(host, port))
            }
            "unix" => {
                let path = percent_decode_str(url.path())
                    .decode_utf8()
                    .map_err(|e| Self::invalid(input, e.to_string()))?;
                if path.is_empty() || path == "/" {
                    return Err(Self::invalid(input, "missing socket path"));
                }
                Ok(Self::unix(path.into_owned()))
            }
            other => Err(Self::invalid(
                input,
                format!("unsupported scheme '{other}' (expected tcp:// or unix://)"),
            )),
        }
    }
}

impl TryFrom<String> for DaemonEndpoint {
    type Error = TransportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DaemonEndpoint> for String {
    fn from(endpoint: DaemonEndpoint) -> Self {
        endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp() {
        let endpoint: DaemonEndpoint = "tcp://127.0.0.1:31337".parse().unwrap();
        assert_eq!(endpoint, DaemonEndpoint::tcp("127.0.0.1", 31337));
        assert!(endpoint.unix_path().is_none());
    }

    #[test]
    fn test_parse_tcp_ipv6() {
        let endpoint: DaemonEndpoint = "tcp://[::1]:31337".parse().unwrap();
        assert_eq!(endpoint, DaemonEndpoint::tcp("::1", 31337));
        assert_eq!(endpoint.to_string(), "tcp://[::1]:31337");
    }

    #[test]
    fn test_parse_unix() {
        let endpoint: DaemonEndpoint = "unix:///var/run/scamper.sock".parse().unwrap();
        assert_eq!(
            endpoint.unix_path(),
            Some(Path::new("/var/run/scamper.sock"))
        );
        assert_eq!(endpoint.to_string(), "unix:///var/run/scamper.sock");
    }

    #[test]
    fn test_parse_unix_decodes_path() {
        let endpoint: DaemonEndpoint = "unix:///tmp/my%20dir/scamper.sock".parse().unwrap();
        assert_eq!(
            endpoint.unix_path(),
            Some(Path::new("/tmp/my dir/scamper.sock"))
        );

        let spaced: DaemonEndpoint = "unix:///tmp/my dir/scamper.sock".parse().unwrap();
        assert_eq!(spaced, endpoint);
        assert_eq!(endpoint.to_string().parse::<DaemonEndpoint>().unwrap(), endpoint);
    }

    #[test]
    fn test_bare_host_port_is_rejected() {
        // No guessing from the address shape
        assert!("127.0.0.1:31337".parse::<DaemonEndpoint>().is_err());
        assert!("/var/run/scamper.sock".parse::<DaemonEndpoint>().is_err());
    }

    #[test]
    fn test_missing_parts() {
        assert!("tcp://127.0.0.1".parse::<DaemonEndpoint>().is_err());
        assert!("unix://".parse::<DaemonEndpoint>().is_err());
        let err = "http://localhost:80".parse::<DaemonEndpoint>().unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(DaemonEndpoint::default().to_string(), "tcp://127.0.0.1:31337");
    }

    #[test]
    fn test_serde_as_string() {
        let endpoint = DaemonEndpoint::unix("/tmp/scamper.sock");
        let json = serde_json::to_string(&endpoint).unwrap();
        assert_eq!(json, "\"unix:///tmp/scamper.sock\"");
        let back: DaemonEndpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, endpoint);
    }
}
