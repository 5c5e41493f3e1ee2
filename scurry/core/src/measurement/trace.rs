//! Options for scamper's `trace` command.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::flags::{check_words, Flags};
use super::names;
use crate::error::{InvalidTaskError, NameParseError};

/// Packet type used for traceroute probes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum TraceMethod {
    /// UDP with an incrementing destination port
    Udp,
    /// ICMP echo request
    Icmp,
    /// UDP holding the flow identifier constant
    #[default]
    UdpParis,
    /// ICMP echo holding the flow identifier constant
    IcmpParis,
    /// TCP SYN
    Tcp,
    /// TCP ACK
    TcpAck,
}

impl TraceMethod {
    /// Name table, shared by parsing, display and serde
    pub const NAMES: &'static [(Self, &'static str)] = &[
        (Self::Udp, "udp"),
        (Self::Icmp, "icmp"),
        (Self::UdpParis, "udp-paris"),
        (Self::IcmpParis, "icmp-paris"),
        (Self::Tcp, "tcp"),
        (Self::TcpAck, "tcp-ack"),
    ];

    /// scamper's name for this method
    #[must_use]
    pub fn as_str(self) -> &'static str {
        names::name_of(Self::NAMES, self)
    }
}

impl fmt::Display for TraceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceMethod {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        names::parse(Self::NAMES, "trace method", s)
    }
}

impl From<TraceMethod> for &'static str {
    fn from(method: TraceMethod) -> Self {
        method.as_str()
    }
}

impl TryFrom<String> for TraceMethod {
    type Error = NameParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parameters for a traceroute measurement
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    /// `-c`: confidence level for stopping at a hop (95 or 99)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    /// `-d`: destination port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
    /// `-f`: TTL of the first hop probed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_hop: Option<u8>,
    /// `-g`: consecutive unresponsive hops before giving up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_limit: Option<u8>,
    /// `-l`: loops allowed before stopping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loops: Option<u8>,
    /// `-m`: maximum TTL probed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ttl: Option<u8>,
    /// `-P`: probe packet type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<TraceMethod>,
    /// `-q`: attempts per hop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u8>,
    /// `-Q`: send every attempt even after a reply
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub all_attempts: bool,
    /// `-s`: source port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    /// `-S`: source address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_addr: Option<String>,
    /// `-t`: IP type-of-service byte
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tos: Option<u8>,
    /// `-w`: seconds to wait for a reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<u8>,
}

impl TraceOptions {
    /// Render as scamper `trace` flags
    #[must_use]
    pub fn command_fragment(&self) -> String {
        Flags::new()
            .value('c', self.confidence.as_ref())
            .value('d', self.dst_port.as_ref())
            .value('f', self.first_hop.as_ref())
            .value('g', self.gap_limit.as_ref())
            .value('l', self.loops.as_ref())
            .value('m', self.max_ttl.as_ref())
            .value('P', self.method.as_ref())
            .value('q', self.attempts.as_ref())
            .switch('Q', self.all_attempts)
            .value('s', self.src_port.as_ref())
            .value('S', self.src_addr.as_ref())
            .value('t', self.tos.as_ref())
            .value('w', self.wait.as_ref())
            .finish()
    }

    /// Check that every free-text option is a single word
    ///
    /// # Errors
    ///
    /// Returns the source address if it is empty or contains whitespace or
    /// control characters.
    pub fn validate(&self) -> Result<(), InvalidTaskError> {
        check_words(&[("source address", self.src_addr.as_ref())])
    }
}
