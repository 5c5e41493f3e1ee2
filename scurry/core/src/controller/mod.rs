//! Task Controller
//!
//! Sits between callers and an [`Attachment`]. Two pipelines run per
//! controller and meet only in the [`OutstandingRegistry`]:
//!
//! ```text
//!   submit ──► submission ──► registry ──► attachment commands
//!
//!   attachment results/errors ──► correlation ──► registry ──► take_results
//! ```
//!
//! # Lifecycle
//!
//! 1. [`Controller::connect`] attaches and starts both pipelines.
//! 2. Tasks go in through [`Controller::submit`] or a [`Submitter`].
//! 3. [`Controller::drain`] stops submission once everything queued is sent.
//! 4. The correlation pipeline lingers for outstanding results, delivers the
//!    rest abandoned, and closes the output queue.
//! 5. [`Controller::close`] waits for that and detaches.
//!
//! Every submitted task comes out of [`Controller::take_results`] exactly
//! once. The output queue is bounded, so it has to be consumed while the
//! controller runs.

mod config;
mod correlation;
mod registry;
mod submission;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, info_span, Instrument};

use crate::error::ControllerError;
use crate::measurement::Task;
use crate::transport::Attachment;
use crate::worker::Worker;
use correlation::{Correlator, Inbound};

pub use config::{ControllerConfig, DEFAULT_SHUTDOWN_LINGER};
pub use registry::OutstandingRegistry;

/// What happened to the tasks of one controller run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Tasks delivered with a result
    pub resolved: u64,
    /// Tasks delivered without a result
    pub abandoned: u64,
    /// `ERR` lines received
    pub rejected: u64,
    /// Results that matched no outstanding task
    pub missed: u64,
    /// Result lines that could not be decoded
    pub undecodable: u64,
    /// Whether the linger expired with results still outstanding
    pub timed_out: bool,
}

impl DrainReport {
    /// Total tasks delivered
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.resolved + self.abandoned
    }
}

impl fmt::Display for DrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resolved, {} abandoned, {} rejected, {} missed",
            self.resolved, self.abandoned, self.rejected, self.missed
        )?;
        if self.undecodable > 0 {
            write!(f, ", {} undecodable", self.undecodable)?;
        }
        if self.timed_out {
            f.write_str(" (linger expired)")?;
        }
        Ok(())
    }
}

/// Cloneable handle for submitting tasks
#[derive(Clone, Debug)]
pub struct Submitter {
    tasks: mpsc::Sender<Task>,
}

impl Submitter {
    /// Queue a task, waiting while the submission queue is full
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Closed`] after [`Controller::drain`] or
    /// once the controller has shut down.
    pub async fn submit(&self, task: Task) -> Result<(), ControllerError> {
        self.tasks
            .send(task)
            .await
            .map_err(|_| ControllerError::Closed)
    }

    /// Whether submissions are no longer accepted
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tasks.is_closed()
    }
}

/// Submits tasks to scamper and correlates their results
#[derive(Debug)]
pub struct Controller {
    submitter: Submitter,
    results: Option<mpsc::Receiver<Task>>,
    registry: Arc<OutstandingRegistry>,
    attachment: Attachment,
    submission: Option<Worker<u64>>,
    correlation: Worker<DrainReport>,
    abandoned_at_submit: u64,
    span: tracing::Span,
}

impl Controller {
    /// Connect to scamper and start both pipelines
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Transport`] if the attachment cannot be
    /// opened.
    pub async fn connect(config: &ControllerConfig) -> Result<Self, ControllerError> {
        let attachment = Attachment::open(&config.transport).await?;
        Ok(Self::with_attachment(attachment, config))
    }

    /// Start both pipelines on an existing attachment
    ///
    /// The attachment's result and error streams must not have been taken.
    pub fn with_attachment(mut attachment: Attachment, config: &ControllerConfig) -> Self {
        let span = info_span!("controller");
        let registry = Arc::new(OutstandingRegistry::new());
        let (task_tx, task_rx) = mpsc::channel(config.task_queue_capacity.max(1));
        let (output_tx, output_rx) = mpsc::channel(config.result_queue_capacity.max(1));

        let submission = Worker::spawn(span.clone(), {
            let commands = attachment.commands();
            let registry = Arc::clone(&registry);
            let output = output_tx.clone();
            move |stop| submission::run_submission(task_rx, commands, registry, output, stop)
        });

        let inbound = Inbound::new(attachment.take_results(), attachment.take_errors());
        let correlator = Correlator::new(Arc::clone(&registry), output_tx);
        let linger = config.shutdown_linger();
        let correlation = Worker::spawn(span.clone(), move |drained| {
            correlator.run(inbound, drained, linger)
        });

        span.in_scope(|| info!("Controller started"));

        Self {
            submitter: Submitter { tasks: task_tx },
            results: Some(output_rx),
            registry,
            attachment,
            submission: Some(submission),
            correlation,
            abandoned_at_submit: 0,
            span,
        }
    }

    /// Queue a task for sending
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Closed`] once draining has begun.
    pub async fn submit(&self, task: Task) -> Result<(), ControllerError> {
        self.submitter.submit(task).await
    }

    /// A handle feeder tasks can submit through
    #[must_use]
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Take the stream of delivered tasks
    ///
    /// Returns `None` if already taken. The stream closes after the last
    /// task has been delivered.
    pub fn take_results(&mut self) -> Option<mpsc::Receiver<Task>> {
        self.results.take()
    }

    /// Estimated number of results still to come
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.registry.outstanding()
    }

    /// Stop accepting tasks and begin shutdown
    ///
    /// Waits until every task queued before the call has been registered
    /// and its command handed to the attachment. Calling it again does
    /// nothing.
    pub async fn drain(&mut self) {
        let Some(submission) = self.submission.take() else {
            return;
        };

        let span = self.span.clone();
        async {
            self.abandoned_at_submit = submission.stop().await.unwrap_or_default();
            info!(outstanding = self.registry.outstanding(), "Submissions drained");
            self.correlation.signal();
        }
        .instrument(span)
        .await;
    }

    /// Drain if needed, wait for the last delivery, and detach
    ///
    /// If the output stream was never taken, deliveries are dropped.
    pub async fn close(mut self) -> DrainReport {
        drop(self.results.take());
        self.drain().await;

        let Self {
            correlation,
            attachment,
            abandoned_at_submit,
            span,
            ..
        } = self;

        async move {
            let mut report = correlation.join().await.unwrap_or_default();
            report.abandoned += abandoned_at_submit;
            attachment.close().await;
            info!(%report, "Controller closed");
            report
        }
        .instrument(span)
        .await
    }
}
