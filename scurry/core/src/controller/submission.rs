//! Submission Pipeline
//!
//! Turns submitted tasks into commands: register, render, queue. Once told
//! to stop it refuses new tasks but still sends everything already queued.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::registry::OutstandingRegistry;
use crate::measurement::{Task, TaskState};
use crate::worker::StopSignal;

/// Run until stopped, then flush; returns how many tasks were abandoned
pub(super) async fn run_submission(
    mut tasks: mpsc::Receiver<Task>,
    commands: mpsc::Sender<String>,
    registry: Arc<OutstandingRegistry>,
    output: mpsc::Sender<Task>,
    mut stop: StopSignal,
) -> u64 {
    let mut abandoned = 0;

    loop {
        let task = tokio::select! {
            biased;
            _ = &mut stop => break,
            task = tasks.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };
        if !dispatch(task, &commands, &registry, &output).await {
            abandoned += 1;
        }
    }

    tasks.close();
    let mut flushed = 0u64;
    while let Some(task) = tasks.recv().await {
        if !dispatch(task, &commands, &registry, &output).await {
            abandoned += 1;
        }
        flushed += 1;
    }

    info!(flushed, abandoned, "Submission pipeline drained");
    abandoned
}

/// Register one task and queue its command
///
/// A task that would not render as a single command line is never
/// registered. It is delivered abandoned straight away, as is a task whose
/// command queue is gone. Returns whether the command was queued.
async fn dispatch(
    mut task: Task,
    commands: &mpsc::Sender<String>,
    registry: &OutstandingRegistry,
    output: &mpsc::Sender<Task>,
) -> bool {
    if let Err(e) = task.validate() {
        error!(error = %e, "Refusing task");
        task.state = TaskState::Abandoned;
        if output.send(task).await.is_err() {
            debug!("No task consumer, dropping refused task");
        }
        return false;
    }

    let (id, command) = registry.register(task);
    debug!(id, command = %command, "Queueing command");

    if commands.send(command).await.is_ok() {
        return true;
    }

    if let Some(task) = registry.abandon(id) {
        error!(id, destination = %task.target, "Connection closed, abandoning task");
        if output.send(task).await.is_err() {
            debug!(id, "No task consumer, dropping abandoned task");
        }
    }
    false
}
