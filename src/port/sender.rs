//! Producer handle for posting completions.

use super::queue::CompletionQueue;
use crate::error::{Error, Result};
use crate::op::table::{Claim, OpTable};
use crate::op::Delivery;
use crate::time::TimeSource;
use crate::tracing_compat::{trace, warn};
use crate::types::{OpId, PortId, Status};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// State shared between a port and its producers.
pub(crate) struct Shared {
    pub(crate) port: PortId,
    pub(crate) table: OpTable,
    pub(crate) queue: CompletionQueue,
    pub(crate) clock: Arc<dyn TimeSource>,
    pub(crate) discarded: AtomicU64,
    pub(crate) closed: AtomicBool,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("port", &self.port)
            .field("capacity", &self.table.len())
            .field("discarded", &self.discarded.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// A cloneable, `Send` handle that reports completions to one port.
///
/// Reactors receive one with every armed operation. Completing a record that
/// was cancelled or already recycled is not an error: the status is dropped
/// and [`Delivery::Discarded`] is returned. Completing the same record twice
/// is a defect and fails with `InvalidArgument`.
#[derive(Clone, Debug)]
pub struct CompletionSender {
    shared: Arc<Shared>,
}

enum Validated {
    Claimed(u32),
    Discarded,
}

impl CompletionSender {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// The port this sender reports to.
    #[must_use]
    pub fn port(&self) -> PortId {
        self.shared.port
    }

    /// Posts the completion of `op` with `status`.
    pub fn complete(&self, op: OpId, status: Status) -> Result<Delivery> {
        match self.claim(op, status, self.shared.clock.now())? {
            Validated::Claimed(slot) => {
                self.shared.queue.push_chain(&self.shared.table, &[slot]);
                trace!(op = ?op, status = ?status, "completion queued");
                Ok(Delivery::Queued)
            }
            Validated::Discarded => Ok(Delivery::Discarded),
        }
    }

    /// Posts several completions, splicing them into the queue with one CAS.
    ///
    /// The batch keeps its order. Every entry is checked for a foreign port,
    /// an out-of-range slot, or the pending sentinel before anything is
    /// claimed. If an entry turns out to be a second completion, the rest of
    /// the batch is still delivered and the first such error is returned.
    pub fn complete_batch(&self, batch: &[(OpId, Status)]) -> Result<usize> {
        for &(op, status) in batch {
            self.check(op, status)?;
        }
        let now = self.shared.clock.now();
        let mut chain = Vec::with_capacity(batch.len());
        let mut first_err = None;
        for &(op, status) in batch {
            match self.claim(op, status, now) {
                Ok(Validated::Claimed(slot)) => chain.push(slot),
                Ok(Validated::Discarded) => {}
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        self.shared.queue.push_chain(&self.shared.table, &chain);
        trace!(port = %self.shared.port, queued = chain.len(), "completion batch queued");
        match first_err {
            Some(err) => Err(err),
            None => Ok(chain.len()),
        }
    }

    /// Wakes the port if it is parked in `drain`, without posting anything.
    pub fn wake(&self) {
        self.shared.queue.notify();
    }

    fn check(&self, op: OpId, status: Status) -> Result<()> {
        if op.port() != self.shared.port {
            return Err(Error::invalid("operation belongs to another port").with_op(op));
        }
        if status.is_pending() {
            return Err(Error::invalid("pending is not a completion status").with_op(op));
        }
        if self.shared.table.get(op.slot()).is_none() {
            return Err(Error::invalid("operation slot out of range").with_op(op));
        }
        Ok(())
    }

    fn claim(&self, op: OpId, status: Status, now: crate::types::Time) -> Result<Validated> {
        self.check(op, status)?;
        if self.shared.closed.load(Ordering::Acquire) {
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            return Ok(Validated::Discarded);
        }
        let Some(slot) = self.shared.table.get(op.slot()) else {
            return Err(Error::invalid("operation slot out of range").with_op(op));
        };
        match slot.try_complete(op.generation(), status, now) {
            Ok(()) => Ok(Validated::Claimed(op.slot())),
            Err(Claim::Cancelled | Claim::Stale) => {
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
                trace!(op = ?op, status = ?status, "late completion discarded");
                Ok(Validated::Discarded)
            }
            Err(Claim::Completed) => {
                warn!(op = ?op, status = ?status, "operation completed twice");
                Err(Error::invalid("operation already completed").with_op(op))
            }
        }
    }
}
