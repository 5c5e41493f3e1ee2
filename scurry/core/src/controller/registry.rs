//! Outstanding Task Registry
//!
//! Tracks every task whose command has been handed to the attachment and
//! which has not yet been resolved or abandoned. The ID counter lives under
//! the same lock as the map, so allocation and insertion are one step.
//!
//! scamper's `ERR` lines carry no correlation ID. They are only counted,
//! and the count is subtracted from the registry size to estimate how many
//! results can still arrive.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use crate::measurement::{Task, TaskState};
use crate::result::ScamperResult;

#[derive(Debug)]
struct Inner {
    next_id: u64,
    tasks: BTreeMap<u64, Task>,
}

/// Tasks sent to scamper and not yet delivered
#[derive(Debug)]
pub struct OutstandingRegistry {
    inner: Mutex<Inner>,
    rejections: AtomicU64,
}

impl Default for OutstandingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OutstandingRegistry {
    /// Create an empty registry; the first ID handed out is 1
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                tasks: BTreeMap::new(),
            }),
            rejections: AtomicU64::new(0),
        }
    }

    /// Assign the next ID to `task`, record it, and render its command
    pub fn register(&self, mut task: Task) -> (u64, String) {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        task.correlation_id = Some(id);
        task.state = TaskState::InFlight;
        task.result = None;
        let command = task.command_for(id);
        inner.tasks.insert(id, task);
        (id, command)
    }

    /// Remove `id` and attach its result
    ///
    /// Returns `None` if `id` is unknown or was already removed.
    pub fn resolve(&self, id: u64, result: ScamperResult) -> Option<Task> {
        let mut task = self.inner.lock().tasks.remove(&id)?;
        task.state = TaskState::Resolved;
        task.result = Some(result);
        Some(task)
    }

    /// Remove `id` without a result
    pub fn abandon(&self, id: u64) -> Option<Task> {
        let mut task = self.inner.lock().tasks.remove(&id)?;
        task.state = TaskState::Abandoned;
        Some(task)
    }

    /// Remove every remaining task, in ID order, marked abandoned
    pub fn drain_abandoned(&self) -> Vec<Task> {
        let tasks = std::mem::take(&mut self.inner.lock().tasks);
        tasks
            .into_values()
            .map(|mut task| {
                task.state = TaskState::Abandoned;
                task
            })
            .collect()
    }

    /// Count one rejection, returning the new total
    pub fn record_rejection(&self) -> u64 {
        self.rejections.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Rejections counted so far
    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::SeqCst)
    }

    /// Number of registered tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// Whether no task is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().tasks.is_empty()
    }

    /// Estimated number of results still to come
    ///
    /// Registry size minus rejections, never below zero. More rejections
    /// than registered tasks means the bookkeeping is off; that is logged
    /// and treated as nothing outstanding.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        let registered = self.len() as u64;
        let rejections = self.rejections();
        let excess = rejections.saturating_sub(registered);
        if excess > 0 {
            warn!(registered, rejections, excess, "More rejections than outstanding tasks");
        }
        registered.saturating_sub(rejections)
    }

    /// How far rejections exceed the registered tasks, zero when consistent
    ///
    /// Anything above zero is the condition [`outstanding`](Self::outstanding)
    /// warns about.
    #[must_use]
    pub fn excess_rejections(&self) -> u64 {
        self.rejections().saturating_sub(self.len() as u64)
    }
}
