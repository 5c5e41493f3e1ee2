//! Options for scamper's `ping` command.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::flags::{check_words, Flags};
use super::names;
use crate::error::{InvalidTaskError, NameParseError};

/// Packet type used for ping probes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum PingMethod {
    /// ICMP echo request
    #[default]
    IcmpEcho,
    /// ICMP timestamp request
    IcmpTime,
    /// TCP SYN
    TcpSyn,
    /// TCP ACK
    TcpAck,
    /// TCP ACK with a varying source port
    TcpAckSport,
    /// TCP SYN/ACK
    TcpSynAck,
    /// TCP RST
    TcpRst,
    /// UDP to a fixed port
    Udp,
    /// UDP with a varying destination port
    UdpDport,
}

impl PingMethod {
    /// Name table, shared by parsing, display and serde
    pub const NAMES: &'static [(Self, &'static str)] = &[
        (Self::IcmpEcho, "icmp-echo"),
        (Self::IcmpTime, "icmp-time"),
        (Self::TcpSyn, "tcp-syn"),
        (Self::TcpAck, "tcp-ack"),
        (Self::TcpAckSport, "tcp-ack-sport"),
        (Self::TcpSynAck, "tcp-synack"),
        (Self::TcpRst, "tcp-rst"),
        (Self::Udp, "udp"),
        (Self::UdpDport, "udp-dport"),
    ];

    /// scamper's name for this method
    #[must_use]
    pub fn as_str(self) -> &'static str {
        names::name_of(Self::NAMES, self)
    }
}

impl fmt::Display for PingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PingMethod {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        names::parse(Self::NAMES, "ping method", s)
    }
}

impl From<PingMethod> for &'static str {
    fn from(method: PingMethod) -> Self {
        method.as_str()
    }
}

impl TryFrom<String> for PingMethod {
    type Error = NameParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parameters for a ping measurement
///
/// Unset fields are left out of the command so scamper applies its own
/// defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingOptions {
    /// `-A`: TCP acknowledgement (or sequence, for resets) number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_ack: Option<u32>,
    /// `-B`: payload to include in each probe, in hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// `-c`: number of probes to send
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_count: Option<u16>,
    /// `-C`: ICMP checksum to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_sum: Option<u16>,
    /// `-d`: destination port (or first ICMP sequence number)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
    /// `-F`: source port (or ICMP ID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    /// `-i`: seconds between probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<u8>,
    /// `-m`: TTL of outgoing packets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u8>,
    /// `-M`: pseudo MTU
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,
    /// `-o`: replies required before probing stops
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u16>,
    /// `-p`: byte pattern for the probe body, in hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// `-P`: probe packet type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<PingMethod>,
    /// `-r`: router address to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_addr: Option<String>,
    /// `-R`: set the record-route IP option
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub record_route: bool,
    /// `-s`: probe size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u16>,
    /// `-S`: source address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_addr: Option<String>,
    /// `-T`: IP timestamp option
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// `-W`: seconds to wait for replies after the last probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u8>,
}

impl PingOptions {
    /// Render as scamper `ping` flags
    #[must_use]
    pub fn command_fragment(&self) -> String {
        Flags::new()
            .value('A', self.tcp_ack.as_ref())
            .value('B', self.payload.as_ref())
            .value('c', self.probe_count.as_ref())
            .value('C', self.icmp_sum.as_ref())
            .value('d', self.dst_port.as_ref())
            .value('F', self.src_port.as_ref())
            .value('i', self.wait.as_ref())
            .value('m', self.ttl.as_ref())
            .value('M', self.mtu.as_ref())
            .value('o', self.reply_count.as_ref())
            .value('p', self.pattern.as_ref())
            .value('P', self.method.as_ref())
            .value('r', self.router_addr.as_ref())
            .switch('R', self.record_route)
            .value('s', self.size.as_ref())
            .value('S', self.src_addr.as_ref())
            .value('T', self.timestamp.as_ref())
            .value('W', self.timeout.as_ref())
            .finish()
    }

    /// Check that every free-text option is a single word
    ///
    /// # Errors
    ///
    /// Returns the first option that is empty or contains whitespace or
    /// control characters.
    pub fn validate(&self) -> Result<(), InvalidTaskError> {
        check_words(&[
            ("payload", self.payload.as_ref()),
            ("pattern", self.pattern.as_ref()),
            ("router address", self.router_addr.as_ref()),
            ("source address", self.src_addr.as_ref()),
            ("timestamp option", self.timestamp.as_ref()),
        ])
    }
}
