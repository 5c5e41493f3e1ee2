//! Background worker handles.
//!
//! Every loop in this crate is a spawned task that watches a one-shot stop
//! signal at its blocking points. A [`Worker`] keeps the sending half of that
//! signal next to the task's join handle so the owner can stop it and wait
//! for it in one step.

use std::fmt;
use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Stop signal handed to a worker loop
///
/// Resolves when the owner asks the worker to stop, or when the owner is
/// dropped without asking.
pub(crate) type StopSignal = oneshot::Receiver<()>;

/// Handle to a spawned worker loop returning `T`
pub(crate) struct Worker<T> {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<T>,
}

impl<T> fmt::Debug for Worker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("signalled", &self.stop.is_none())
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl<T: Send + 'static> Worker<T> {
    /// Spawn `body` inside `span`, giving it the stop signal
    pub(crate) fn spawn<F, Fut>(span: tracing::Span, body: F) -> Self
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(body(stop_rx).instrument(span));
        Self {
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Ask the worker to stop without waiting for it
    pub(crate) fn signal(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The worker may already have exited on its own
            let _ = stop.send(());
        }
    }

    /// Wait for the worker to finish without signalling it
    ///
    /// Returns `None` if the worker panicked or was aborted.
    pub(crate) async fn join(self) -> Option<T> {
        match self.handle.await {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::error!(error = %e, "Worker task failed");
                None
            }
        }
    }

    /// Signal the worker and wait for it to finish
    pub(crate) async fn stop(mut self) -> Option<T> {
        self.signal();
        self.join().await
    }
}
