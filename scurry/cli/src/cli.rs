//! Command-line arguments

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use scurry_core::{
    ConfigOverrides, DaemonEndpoint, PingMethod, PingOptions, ProbeOptions, TraceMethod,
    TraceOptions,
};

/// Scurry - run ping and traceroute measurements through scamper
#[derive(Parser, Debug)]
#[command(name = "scurry")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to measure (repeatable)
    #[arg(short = 't', long = "target", value_name = "ADDR")]
    pub targets: Vec<String>,

    /// File with one target per line (`#` starts a comment)
    #[arg(long, value_name = "FILE")]
    pub target_file: Option<PathBuf>,

    /// scamper control socket (tcp://host:port or unix:///path)
    #[arg(short = 's', long, value_name = "URI")]
    pub endpoint: Option<DaemonEndpoint>,

    /// Configuration file path
    #[arg(long, env = "SCURRY_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds to wait for outstanding results after the last submission
    #[arg(long, value_name = "SECS")]
    pub linger_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "SCURRY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub probe: Probe,
}

impl Args {
    /// CLI flags that take priority over file and environment settings
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(endpoint) = &self.endpoint {
            overrides = overrides.with_endpoint(endpoint.clone());
        }
        if let Some(secs) = self.linger_secs {
            overrides = overrides.with_linger_secs(secs);
        }
        overrides
    }

    /// Targets from `--target` followed by those in `--target-file`
    pub fn collect_targets(&self) -> Result<Vec<String>> {
        let mut targets = self.targets.clone();
        if let Some(path) = &self.target_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read target file: {path:?}"))?;
            targets.extend(parse_targets(&text));
        }
        if targets.is_empty() {
            anyhow::bail!("No targets given (use --target or --target-file)");
        }
        Ok(targets)
    }
}

/// Split a target list into addresses, skipping blanks and comments
pub fn parse_targets(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Measurement to run against every target
#[derive(Subcommand, Debug)]
pub enum Probe {
    /// Send ping probes
    Ping(PingArgs),
    /// Trace the path to each target
    Trace(TraceArgs),
}

impl Probe {
    /// Options shared by every task of this run
    pub fn options(&self) -> ProbeOptions {
        match self {
            Self::Ping(args) => ProbeOptions::Ping(args.clone().into()),
            Self::Trace(args) => ProbeOptions::Trace(args.clone().into()),
        }
    }
}

/// Flags for `ping`, named after scamper's own
#[derive(ClapArgs, Clone, Debug, Default)]
pub struct PingArgs {
    /// TCP acknowledgement number
    #[arg(short = 'A', value_name = "NUM")]
    pub tcp_ack: Option<u32>,

    /// Probe payload, in hex
    #[arg(short = 'B', value_name = "HEX")]
    pub payload: Option<String>,

    /// Number of probes to send
    #[arg(short = 'c', value_name = "COUNT")]
    pub probe_count: Option<u16>,

    /// ICMP checksum
    #[arg(short = 'C', value_name = "SUM")]
    pub icmp_sum: Option<u16>,

    /// Destination port
    #[arg(short = 'd', value_name = "PORT")]
    pub dst_port: Option<u16>,

    /// Source port
    #[arg(short = 'F', value_name = "PORT")]
    pub src_port: Option<u16>,

    /// Seconds between probes
    #[arg(short = 'i', value_name = "SECS")]
    pub wait: Option<u8>,

    /// TTL of outgoing packets
    #[arg(short = 'm', value_name = "TTL")]
    pub ttl: Option<u8>,

    /// Pseudo MTU
    #[arg(short = 'M', value_name = "MTU")]
    pub mtu: Option<u16>,

    /// Replies required before stopping
    #[arg(short = 'o', value_name = "COUNT")]
    pub reply_count: Option<u16>,

    /// Probe body pattern, in hex
    #[arg(short = 'p', value_name = "HEX")]
    pub pattern: Option<String>,

    /// Probe packet type
    #[arg(short = 'P', value_name = "METHOD")]
    pub method: Option<PingMethod>,

    /// Router address
    #[arg(short = 'r', value_name = "ADDR")]
    pub router_addr: Option<String>,

    /// Set the record-route option
    #[arg(short = 'R')]
    pub record_route: bool,

    /// Probe size in bytes
    #[arg(short = 's', value_name = "BYTES")]
    pub size: Option<u16>,

    /// Source address
    #[arg(short = 'S', value_name = "ADDR")]
    pub src_addr: Option<String>,

    /// IP timestamp option
    #[arg(short = 'T', value_name = "OPTION")]
    pub timestamp: Option<String>,

    /// Seconds to wait after the last probe
    #[arg(short = 'W', value_name = "SECS")]
    pub timeout: Option<u8>,
}

impl From<PingArgs> for PingOptions {
    fn from(args: PingArgs) -> Self {
        Self {
            tcp_ack: args.tcp_ack,
            payload: args.payload,
            probe_count: args.probe_count,
            icmp_sum: args.icmp_sum,
            dst_port: args.dst_port,
            src_port: args.src_port,
            wait: args.wait,
            ttl: args.ttl,
            mtu: args.mtu,
            reply_count: args.reply_count,
            pattern: args.pattern,
            method: args.method,
            router_addr: args.router_addr,
            record_route: args.record_route,
            size: args.size,
            src_addr: args.src_addr,
            timestamp: args.timestamp,
            timeout: args.timeout,
        }
    }
}

/// Flags for `trace`, named after scamper's own
#[derive(ClapArgs, Clone, Debug, Default)]
pub struct TraceArgs {
    /// Confidence level for stopping at a hop
    #[arg(short = 'c', value_name = "LEVEL")]
    pub confidence: Option<u8>,

    /// Destination port
    #[arg(short = 'd', value_name = "PORT")]
    pub dst_port: Option<u16>,

    /// First TTL probed
    #[arg(short = 'f', value_name = "TTL")]
    pub first_hop: Option<u8>,

    /// Unresponsive hops before giving up
    #[arg(short = 'g', value_name = "HOPS")]
    pub gap_limit: Option<u8>,

    /// Loops allowed before stopping
    #[arg(short = 'l', value_name = "COUNT")]
    pub loops: Option<u8>,

    /// Maximum TTL probed
    #[arg(short = 'm', value_name = "TTL")]
    pub max_ttl: Option<u8>,

    /// Probe packet type
    #[arg(short = 'P', value_name = "METHOD")]
    pub method: Option<TraceMethod>,

    /// Attempts per hop
    #[arg(short = 'q', value_name = "COUNT")]
    pub attempts: Option<u8>,

    /// Send every attempt even after a reply
    #[arg(short = 'Q')]
    pub all_attempts: bool,

    /// Source port
    #[arg(short = 's', value_name = "PORT")]
    pub src_port: Option<u16>,

    /// Source address
    #[arg(short = 'S', value_name = "ADDR")]
    pub src_addr: Option<String>,

    /// IP type-of-service byte
    #[arg(short = 't', value_name = "TOS")]
    pub tos: Option<u8>,

    /// Seconds to wait for a reply
    #[arg(short = 'w', value_name = "SECS")]
    pub wait: Option<u8>,
}

impl From<TraceArgs> for TraceOptions {
    fn from(args: TraceArgs) -> Self {
        Self {
            confidence: args.confidence,
            dst_port: args.dst_port,
            first_hop: args.first_hop,
            gap_limit: args.gap_limit,
            loops: args.loops,
            max_ttl: args.max_ttl,
            method: args.method,
            attempts: args.attempts,
            all_attempts: args.all_attempts,
            src_port: args.src_port,
            src_addr: args.src_addr,
            tos: args.tos,
            wait: args.wait,
        }
    }
}
