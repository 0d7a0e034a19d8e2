//! Deterministic lab reactor for testing.
//!
//! The [`LabReactor`] never touches the OS. Tests script how each token
//! completes, relative to the virtual time at which it is armed, and the
//! reactor delivers those completions when the port polls it at or after the
//! scheduled time.
//!
//! # Example
//!
//! ```
//! use ioscope::op::OpCode;
//! use ioscope::reactor::LabReactor;
//! use ioscope::time::VirtualClock;
//! use ioscope::types::Status;
//! use ioscope::PortBuilder;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(VirtualClock::new());
//! let reactor = Arc::new(LabReactor::new());
//! reactor.script(7, Duration::from_millis(10), Status::from_raw(64));
//!
//! let mut port = PortBuilder::new()
//!     .time_source(clock.clone())
//!     .reactor(reactor.clone())
//!     .build()
//!     .unwrap();
//! let scope = port.push_scope(false, Some(Duration::from_millis(50))).unwrap();
//! port.submit(OpCode::Recv, Default::default(), 7).unwrap();
//!
//! let done = port.drain(Some(Duration::from_millis(100)));
//! assert_eq!(done.len(), 1);
//! assert_eq!(done[0].status.raw(), 64);
//! port.pop_scope(scope).unwrap();
//! ```

use super::{ArmedOp, Reactor};
use crate::op::OpCode;
use crate::port::CompletionSender;
use crate::tracing_compat::debug;
use crate::types::{OpId, Status, Time};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// A scheduled completion, ordered by delivery time then sequence.
#[derive(Debug)]
struct TimedCompletion {
    time: Time,
    sequence: u64,
    op: OpId,
    status: Status,
}

impl PartialEq for TimedCompletion {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl Eq for TimedCompletion {}

impl PartialOrd for TimedCompletion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedCompletion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest time first, then by sequence for determinism
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// What the lab reactor saw for one armed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedRecord {
    /// Record identity.
    pub id: OpId,
    /// Requested operation.
    pub opcode: OpCode,
    /// Submitter's token.
    pub token: u64,
    /// Virtual time of arming.
    pub armed_at: Time,
}

#[derive(Debug, Default)]
struct LabState {
    scripts: HashMap<u64, (Duration, Status)>,
    pending: BinaryHeap<TimedCompletion>,
    senders: HashMap<OpId, CompletionSender>,
    armed: Vec<ArmedRecord>,
    abandoned: Vec<OpId>,
    next_sequence: u64,
    complete_after_abandon: bool,
}

/// Scripted reactor driven by the port's virtual clock.
#[derive(Debug, Default)]
pub struct LabReactor {
    state: Mutex<LabState>,
}

impl LabReactor {
    /// Creates a reactor with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations armed with `token` complete with `status`, `after` their
    /// arming time. Unscripted tokens never complete on their own.
    pub fn script(&self, token: u64, after: Duration, status: Status) {
        self.state.lock().scripts.insert(token, (after, status));
    }

    /// Keeps delivering scheduled completions even after the port abandons
    /// the operation, to exercise late-completion handling.
    pub fn complete_after_abandon(&self, enabled: bool) {
        self.state.lock().complete_after_abandon = enabled;
    }

    /// Completes an armed operation right away, bypassing any script.
    pub fn complete_now(&self, id: OpId, status: Status) -> Option<crate::Result<crate::op::Delivery>> {
        let sender = self.state.lock().senders.get(&id).cloned()?;
        Some(sender.complete(id, status))
    }

    /// Every operation armed so far, in arming order.
    #[must_use]
    pub fn armed(&self) -> Vec<ArmedRecord> {
        self.state.lock().armed.clone()
    }

    /// Every operation the port abandoned, in order.
    #[must_use]
    pub fn abandoned(&self) -> Vec<OpId> {
        self.state.lock().abandoned.clone()
    }

    /// Number of scheduled completions not yet delivered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl Reactor for LabReactor {
    fn arm(&self, op: ArmedOp) {
        let mut state = self.state.lock();
        state.armed.push(ArmedRecord {
            id: op.id,
            opcode: op.opcode,
            token: op.token,
            armed_at: op.armed_at,
        });
        if let Some(&(after, status)) = state.scripts.get(&op.token) {
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.pending.push(TimedCompletion {
                time: op.armed_at.saturating_add(after),
                sequence,
                op: op.id,
                status,
            });
        }
        state.senders.insert(op.id, op.sender);
    }

    fn abandon(&self, id: OpId) {
        let mut state = self.state.lock();
        state.abandoned.push(id);
        if !state.complete_after_abandon {
            state.pending.retain(|c| c.op != id);
            state.senders.remove(&id);
        }
    }

    fn poll(&self, now: Time) {
        let due = {
            let mut state = self.state.lock();
            let mut due = Vec::new();
            while state.pending.peek().is_some_and(|c| c.time <= now) {
                let Some(next) = state.pending.pop() else {
                    break;
                };
                if let Some(sender) = state.senders.remove(&next.op) {
                    due.push((sender, next));
                }
            }
            due
        };
        // Deliver outside the lock.
        for (sender, completion) in due {
            let delivery = sender.complete(completion.op, completion.status);
            debug!(
                op = ?completion.op,
                at = %completion.time,
                delivery = ?delivery,
                "lab reactor delivered completion"
            );
        }
    }

    fn next_event(&self) -> Option<Time> {
        self.state.lock().pending.peek().map(|c| c.time)
    }
}
