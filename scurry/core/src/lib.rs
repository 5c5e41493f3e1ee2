//! Scurry Core - Control-Socket Client for scamper
//!
//! This crate drives a running [scamper](https://www.caida.org/catalog/software/scamper/)
//! daemon over its control socket: it submits ping and traceroute tasks,
//! respects scamper's `MORE` flow control, and matches the JSON results that
//! stream back to the tasks that asked for them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Caller                                  │
//! │        submit(Task) ──┐                     ┌── take_results()    │
//! └───────────────────────┼─────────────────────┼────────────────────┘
//!                         │                     │
//! ┌───────────────────────┼─────────────────────┼────────────────────┐
//! │                  CONTROLLER                 │                     │
//! │  ┌────────────────────┴───┐   ┌─────────────┴──────────────────┐ │
//! │  │  Submission pipeline   │   │  Correlation pipeline           │ │
//! │  │  id + render command   │   │  match userid, linger, abandon  │ │
//! │  └────────┬───────────────┘   └─────────────▲──────────────────┘ │
//! │           │    ┌────────────────────────┐   │                    │
//! │           └───►│  Outstanding registry  │◄──┘                    │
//! │                └────────────────────────┘                        │
//! └───────────┬─────────────────────────────────▲────────────────────┘
//!             │ commands                        │ results / errors
//! ┌───────────▼─────────────────────────────────┴────────────────────┐
//! │                  ATTACHMENT                                       │
//! │   outbound worker ◄── credits (MORE) ◄── inbound classifier       │
//! └───────────┬─────────────────────────────────▲────────────────────┘
//!             ▼            control socket        │
//!                     scamper (tcp:// or unix://)
//! ```
//!
//! # Key Types
//!
//! - [`Controller`]: submits tasks and delivers them back, resolved or abandoned
//! - [`Attachment`]: the control connection and its line protocol
//! - [`Task`]: a probe request and, once delivered, its outcome
//! - [`ScamperResult`]: a decoded result line
//!
//! # Quick Start
//!
//! ```ignore
//! use scurry_core::{Controller, ControllerConfig, PingOptions, Task};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut controller = Controller::connect(&ControllerConfig::from_env()).await?;
//!     let mut results = controller.take_results().expect("results taken once");
//!
//!     let printer = tokio::spawn(async move {
//!         while let Some(task) = results.recv().await {
//!             println!("{}", task.to_json().unwrap());
//!         }
//!     });
//!
//!     controller.submit(Task::ping("192.0.2.1", PingOptions::default())).await?;
//!     controller.drain().await;
//!     printer.await?;
//!     println!("{}", controller.close().await);
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! Everything is reported through `tracing`. The library never installs a
//! subscriber; the attachment and controller each open a span that their
//! background tasks run inside.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod error;
pub mod measurement;
pub mod protocol;
pub mod result;
pub mod transport;

mod worker;

// Re-exports for convenience
pub use config::{load_config, load_config_from_path, ConfigOverrides, ConfigSource, ScurryConfig};
pub use controller::{Controller, ControllerConfig, DrainReport, Submitter};
pub use error::{
    ControllerError, InvalidTaskError, NameParseError, ProtocolError, TransportError,
};
pub use measurement::{
    PingMethod, PingOptions, ProbeKind, ProbeOptions, Task, TaskState, TraceMethod, TraceOptions,
};
pub use result::ScamperResult;
pub use transport::{Attachment, DaemonEndpoint, TransportConfig};
