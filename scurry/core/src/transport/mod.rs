//! Transport Layer for the scamper Control Socket
//!
//! Owns the single control connection to a scamper daemon:
//! - [`DaemonEndpoint`]: where scamper listens (TCP port or Unix socket)
//! - [`Attachment`]: the connection itself, its workers and queues
//! - [`credit_bank`]: the `MORE` credits that gate every command written
//!
//! # Flow Control
//!
//! scamper announces with `MORE` each time it can take another command.
//! Nothing is written without a banked credit, and a full command queue
//! blocks whoever is feeding it. There is no reconnection: when the socket
//! goes away the queues close and the caller builds a new attachment.

pub mod attachment;
pub mod config;
pub mod credit;
pub mod endpoint;

use tokio::io::{AsyncRead, AsyncWrite};

// Re-exports for convenience
pub use attachment::Attachment;
pub use config::{TransportConfig, DEFAULT_CREDIT_CAPACITY, DEFAULT_QUEUE_CAPACITY};
pub use credit::{credit_bank, CreditGranter, CreditWaiter, GrantOutcome};
pub use endpoint::DaemonEndpoint;

/// Read half of a control connection
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a control connection
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
