//! Command Credits
//!
//! scamper writes `MORE` each time it is willing to accept another command.
//! The inbound side banks each grant here and the outbound worker spends one
//! before every command it writes. The bank is bounded: a grant that arrives
//! while it is full is refused rather than queued.
//!
//! Credits are unit values in a bounded channel.

use tokio::sync::mpsc;

/// Result of banking a grant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Grant banked; `available` credits are now unspent
    Banked {
        /// Unspent credits after banking
        available: usize,
    },
    /// Bank was full, grant dropped
    Overflow,
    /// Nobody will spend credits any more
    Closed,
}

/// Create a credit bank holding at most `capacity` unspent credits
#[must_use]
pub fn credit_bank(capacity: usize) -> (CreditGranter, CreditWaiter) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CreditGranter { tx }, CreditWaiter { rx })
}

/// Banking side, owned by the inbound classifier
#[derive(Debug)]
pub struct CreditGranter {
    tx: mpsc::Sender<()>,
}

impl CreditGranter {
    /// Bank one credit without waiting
    pub fn grant(&self) -> GrantOutcome {
        match self.tx.try_send(()) {
            Ok(()) => GrantOutcome::Banked {
                available: self.available(),
            },
            Err(mpsc::error::TrySendError::Full(())) => GrantOutcome::Overflow,
            Err(mpsc::error::TrySendError::Closed(())) => GrantOutcome::Closed,
        }
    }

    /// Number of unspent credits
    #[must_use]
    pub fn available(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Maximum number of unspent credits
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Spending side, owned by the outbound worker
#[derive(Debug)]
pub struct CreditWaiter {
    rx: mpsc::Receiver<()>,
}

impl CreditWaiter {
    /// Wait for and spend one credit
    ///
    /// Returns `false` once the granting side is gone and the bank is empty.
    pub async fn acquire(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Spend one credit if any is banked
    pub fn try_acquire(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}
