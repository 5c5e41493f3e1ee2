//! Scurry - scamper measurement runner
//!
//! Connects to a scamper daemon, submits one measurement per target, and
//! writes every task as a JSON line on stdout once its result is in (or it
//! has been given up on).
//!
//! # Usage
//!
//! ```bash
//! # Ping two hosts three times each through the default control port
//! scurry -t 8.8.8.8 -t 1.1.1.1 ping -c 3
//!
//! # Traceroute a list of targets over a Unix control socket
//! scurry -s unix:///run/scamper.sock --target-file hosts.txt trace -P icmp-paris
//!
//! # Verbose logging
//! RUST_LOG=debug scurry -t 192.0.2.1 ping
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: stop submitting, then collect what is outstanding

mod cli;

use std::future::Future;

use anyhow::{Context, Result};
use clap::Parser;
use scurry_core::config::default_config_path;
use scurry_core::{load_config_from_path, Controller, ProbeOptions, Submitter, Task};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use cli::Args;

/// Initialize logging with the specified level
///
/// Logs go to stderr; stdout carries only results.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("scurry={level},scurry_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Resolve once SIGINT or SIGTERM arrives
#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received Ctrl-C");
    Ok(())
}

/// Submit one task per target, stopping early if the controller closes
async fn feed(submitter: Submitter, targets: Vec<String>, probe: ProbeOptions) -> usize {
    let mut submitted = 0;
    for target in targets {
        if let Err(e) = submitter.submit(Task::new(target, probe.clone())).await {
            warn!(error = %e, submitted, "Submission refused");
            break;
        }
        submitted += 1;
    }
    submitted
}

/// Wait for the feeder, or stop it early once `shutdown` resolves
///
/// If the signal handlers cannot be installed the feeder runs to completion
/// instead, so the drain that follows is never skipped. Returns how many
/// tasks were submitted when that is known.
async fn run_feeder<S>(mut feeder: JoinHandle<usize>, shutdown: S) -> Option<usize>
where
    S: Future<Output = Result<()>>,
{
    tokio::select! {
        fed = &mut feeder => return feeder_finished(fed),
        signalled = shutdown => match signalled {
            Ok(()) => {
                warn!("Stopping submissions early");
                feeder.abort();
                return None;
            }
            Err(e) => error!(error = %e, "Signal handling unavailable"),
        },
    }
    feeder_finished(feeder.await)
}

fn feeder_finished(fed: Result<usize, JoinError>) -> Option<usize> {
    match fed {
        Ok(submitted) => {
            info!(submitted, "All targets submitted");
            Some(submitted)
        }
        Err(e) => {
            error!(error = %e, "Feeder task failed");
            None
        }
    }
}

/// Write each delivered task to stdout as a JSON line
async fn print_results(mut results: mpsc::Receiver<Task>) -> Result<u64> {
    let mut out = BufWriter::new(tokio::io::stdout());
    let mut printed = 0;

    while let Some(task) = results.recv().await {
        let line = task.to_json().context("Failed to encode task")?;
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await.context("Failed to write to stdout")?;
        printed += 1;
    }

    Ok(printed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let targets = args.collect_targets()?;
    let probe = args.probe.options();

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        endpoint = %config.transport().endpoint,
        source = ?config.source(),
        targets = targets.len(),
        kind = %probe.kind(),
        "Scurry starting"
    );

    let mut controller = Controller::connect(&config.controller)
        .await
        .context("Failed to attach to scamper")?;
    let results = controller
        .take_results()
        .context("Result stream already taken")?;

    let printer = tokio::spawn(print_results(results));
    let feeder = tokio::spawn(feed(controller.submitter(), targets, probe));
    run_feeder(feeder, shutdown_signal()).await;

    controller.drain().await;
    let printed = printer.await.context("Printer task failed");
    let report = controller.close().await;
    let printed = printed??;

    info!(printed, %report, "Scurry finished");
    Ok(())
}
