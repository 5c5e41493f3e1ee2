//! Correlation Pipeline
//!
//! Matches result lines to registered tasks by their `userid` and counts
//! rejections. After the drain signal it lingers while results can still
//! arrive, then hands back whatever is left as abandoned and closes the
//! output queue by dropping its sender.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::registry::OutstandingRegistry;
use super::DrainReport;
use crate::measurement::Task;
use crate::result::ScamperResult;
use crate::worker::StopSignal;

/// A line from the attachment
#[derive(Debug)]
enum Incoming {
    Result(String),
    Rejection(String),
}

/// The attachment's result and error queues
///
/// A queue is dropped once it closes; when both are gone nothing more can
/// arrive.
#[derive(Debug)]
pub(super) struct Inbound {
    results: Option<mpsc::Receiver<String>>,
    errors: Option<mpsc::Receiver<String>>,
}

impl Inbound {
    pub(super) fn new(
        results: Option<mpsc::Receiver<String>>,
        errors: Option<mpsc::Receiver<String>>,
    ) -> Self {
        Self { results, errors }
    }

    fn is_closed(&self) -> bool {
        self.results.is_none() && self.errors.is_none()
    }

    /// Next line from either queue, or `None` once both have closed
    ///
    /// Cancel safe.
    async fn next(&mut self) -> Option<Incoming> {
        while !self.is_closed() {
            tokio::select! {
                line = recv(&mut self.results) => match line {
                    Some(line) => return Some(Incoming::Result(line)),
                    None => self.results = None,
                },
                message = recv(&mut self.errors) => match message {
                    Some(message) => return Some(Incoming::Rejection(message)),
                    None => self.errors = None,
                },
            }
        }
        None
    }
}

async fn recv(queue: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match queue {
        Some(queue) => queue.recv().await,
        None => std::future::pending().await,
    }
}

pub(super) struct Correlator {
    registry: Arc<OutstandingRegistry>,
    output: mpsc::Sender<Task>,
    report: DrainReport,
}

impl Correlator {
    pub(super) fn new(registry: Arc<OutstandingRegistry>, output: mpsc::Sender<Task>) -> Self {
        Self {
            registry,
            output,
            report: DrainReport::default(),
        }
    }

    /// Correlate until drained, linger, then abandon what is left
    pub(super) async fn run(
        mut self,
        mut inbound: Inbound,
        mut drained: StopSignal,
        linger: Duration,
    ) -> DrainReport {
        let hung_up = loop {
            // Lines already queued are handled before the drain signal
            tokio::select! {
                biased;
                incoming = inbound.next() => match incoming {
                    Some(incoming) => self.handle(incoming).await,
                    None => break true,
                },
                _ = &mut drained => break false,
            }
        };

        if hung_up {
            warn!("Connection closed, waiting for submissions to drain");
            let _ = drained.await;
        } else {
            self.linger(&mut inbound, linger).await;
        }

        self.abandon_remaining().await;
        info!(
            resolved = self.report.resolved,
            abandoned = self.report.abandoned,
            rejected = self.report.rejected,
            missed = self.report.missed,
            "Correlation pipeline finished"
        );
        self.report
    }

    async fn linger(&mut self, inbound: &mut Inbound, linger: Duration) {
        let outstanding = self.registry.outstanding();
        if outstanding == 0 {
            debug!("Nothing outstanding, skipping linger");
            return;
        }
        info!(outstanding, linger_ms = linger.as_millis() as u64, "Lingering for results");

        let deadline = tokio::time::sleep(linger);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    self.report.timed_out = true;
                    error!(
                        outstanding = self.registry.outstanding(),
                        "Linger expired before all results arrived"
                    );
                    return;
                }
                incoming = inbound.next() => match incoming {
                    Some(incoming) => self.handle(incoming).await,
                    None => {
                        warn!("Connection closed while lingering");
                        return;
                    }
                },
            }

            if self.registry.outstanding() == 0 {
                info!("All outstanding results received");
                return;
            }
        }
    }

    async fn handle(&mut self, incoming: Incoming) {
        match incoming {
            Incoming::Result(line) => self.on_result(&line).await,
            Incoming::Rejection(message) => self.on_rejection(&message),
        }
    }

    async fn on_result(&mut self, line: &str) {
        let result = match ScamperResult::from_json(line) {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, line, "Dropping undecodable result");
                self.report.undecodable += 1;
                return;
            }
        };

        if result.is_housekeeping() {
            debug!(kind = %result.kind, "Discarding housekeeping record");
            return;
        }

        let Some(id) = result.userid else {
            error!(kind = %result.kind, "Result carries no userid");
            self.report.missed += 1;
            return;
        };

        match self.registry.resolve(id, result) {
            Some(task) => {
                debug!(id, "Resolved task");
                self.report.resolved += 1;
                self.deliver(task).await;
            }
            None => {
                error!(id, "No outstanding task for result");
                self.report.missed += 1;
            }
        }
    }

    fn on_rejection(&mut self, message: &str) {
        let total = self.registry.record_rejection();
        self.report.rejected += 1;
        error!(rejection = message, total, "scamper rejected a command");
    }

    async fn abandon_remaining(&mut self) {
        for task in self.registry.drain_abandoned() {
            warn!(id = ?task.correlation_id, "Abandoning task without result");
            self.report.abandoned += 1;
            self.deliver(task).await;
        }
    }

    async fn deliver(&self, task: Task) {
        if let Err(e) = self.output.send(task).await {
            debug!(task = %e.0, "No task consumer, dropping delivery");
        }
    }
}
