//! The reactor boundary.
//!
//! A [`Reactor`] performs the actual I/O for a port. The port hands it every
//! submitted record through [`Reactor::arm`] and asks it to stop through
//! [`Reactor::abandon`] when a scope is cancelled or popped. Results come back
//! through the [`CompletionSender`] carried by each [`ArmedOp`], from any
//! thread.
//!
//! Two implementations ship with the crate:
//!
//! - [`NoopReactor`]: accepts everything and never completes. Operations end
//!   only through cancellation or deadlines.
//! - [`LabReactor`]: scripted completions at virtual times, for deterministic
//!   tests.

mod lab;

pub use lab::{ArmedRecord, LabReactor};

use crate::op::{OpCode, OpFlags};
use crate::port::CompletionSender;
use crate::types::{Deadline, OpId, Time};

/// An operation handed to the reactor.
#[derive(Debug, Clone)]
pub struct ArmedOp {
    /// Record identity; pass it back to [`CompletionSender::complete`].
    pub id: OpId,
    /// What to do.
    pub opcode: OpCode,
    /// Modifier flags from the submitter.
    pub flags: OpFlags,
    /// The submitter's token.
    pub token: u64,
    /// The record's effective deadline. The port enforces it; a reactor may
    /// use it to give up early.
    pub deadline: Deadline,
    /// Port time at which the record was armed.
    pub armed_at: Time,
    /// Where to report the result.
    pub sender: CompletionSender,
}

/// Performs I/O on behalf of a completion port.
pub trait Reactor: Send + Sync {
    /// Begins work for `op`. Must not block.
    fn arm(&self, op: ArmedOp);

    /// Best-effort request to stop work on `id`.
    ///
    /// The record has already been settled as cancelled; any later completion
    /// for it is discarded by the port.
    fn abandon(&self, id: OpId);

    /// Called by the port on every drain pass before it looks at the queue.
    fn poll(&self, _now: Time) {}

    /// Earliest time at which [`poll`](Self::poll) would make progress.
    ///
    /// A port with a virtual clock uses this to decide how far to jump when
    /// idle.
    fn next_event(&self) -> Option<Time> {
        None
    }
}

/// A reactor that accepts every operation and never completes any.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReactor;

impl Reactor for NoopReactor {
    fn arm(&self, _op: ArmedOp) {}

    fn abandon(&self, _id: OpId) {}
}
