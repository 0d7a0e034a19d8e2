//! The per-thread completion port.
//!
//! A [`CompletionPort`] owns a fixed pool of operation records, a stack of
//! scopes, a timer heap, and the lock-free queue that producers splice finished
//! records into. Everything except the queue and the record state words is
//! owned by the port's thread; the port is deliberately `!Send`.
//!
//! # Lifecycle of a record
//!
//! ```text
//! submit ──► SUBMITTED ──arm──► reactor
//!               │  │
//!               │  └── CompletionSender::complete ──► COMPLETED ─┐
//!               └──── scope cancel / deadline ──────► CANCELLED ─┤
//!                                                               ▼
//!                                         queue ──► drain ──► FREE
//! ```
//!
//! Exactly one of the two transitions out of `SUBMITTED` wins; the loser's
//! status is dropped. A record is handed to the consumer once and then its
//! slot is recycled under a new generation.
//!
//! # Scopes
//!
//! Scopes nest strictly. Each carries an optional deadline; its effective
//! deadline is the earlier of its own and its parent's. When an effective
//! deadline passes, the scope that introduced it is cancelled along with
//! everything nested inside it, and the affected records complete with a
//! timed-out status. A sequential scope releases its records to the consumer
//! in submission order regardless of the order they finish in.

mod builder;
mod parker;
mod queue;
mod scope;
mod sender;

pub use builder::PortBuilder;
pub use scope::ScopeFlags;
pub use sender::CompletionSender;

use crate::config::PortConfig;
use crate::error::{Error, Result};
use crate::op::table::{OpTable, STATE_CANCELLED, STATE_COMPLETED, STATE_SUBMITTED};
use crate::op::{Completion, OpCode, OpFlags};
use crate::reactor::{ArmedOp, Reactor};
use crate::time::{TimeSource, TimerHeap};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::deadline::timeout_from_ms;
use crate::types::{CancelReason, Deadline, OpId, PortId, ScopeId, Status, Time};
use queue::CompletionQueue;
use scope::ScopeStack;
use sender::Shared;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Owner-side bookkeeping for one record slot.
#[derive(Debug, Clone, Copy)]
struct OpMeta {
    opcode: OpCode,
    flags: OpFlags,
    token: u64,
    scope: Option<ScopeId>,
    deadline: Deadline,
    armed: bool,
    /// Settled status waiting for earlier records of a sequential scope.
    held: Option<Status>,
}

impl Default for OpMeta {
    fn default() -> Self {
        Self {
            opcode: OpCode::Nop,
            flags: OpFlags::NONE,
            token: 0,
            scope: None,
            deadline: Deadline::NONE,
            armed: false,
            held: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKey {
    Scope(ScopeId),
    Timer(OpId),
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    submitted: u64,
    completed: u64,
    cancelled: u64,
    timed_out: u64,
}

/// A snapshot of port activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortStats {
    /// Size of the record pool.
    pub capacity: usize,
    /// Records currently allocated: submitted, settled, or held for ordering.
    pub in_flight: usize,
    /// Current scope nesting depth.
    pub scope_depth: usize,
    /// Records ever allocated, timers included.
    pub submitted: u64,
    /// Records delivered with a result from the reactor or a timer.
    pub completed: u64,
    /// Records delivered as cancelled.
    pub cancelled: u64,
    /// Records delivered as timed out.
    pub timed_out: u64,
    /// Producer completions dropped because the record had already settled.
    pub discarded: u64,
}

/// A single-consumer completion port bound to the thread that built it.
pub struct CompletionPort {
    id: PortId,
    config: PortConfig,
    shared: Arc<Shared>,
    reactor: Arc<dyn Reactor>,
    meta: Vec<OpMeta>,
    free: Vec<u32>,
    scopes: ScopeStack,
    timers: TimerHeap<TimerKey>,
    armed_timers: HashMap<u64, OpId>,
    pending_arm: Vec<OpId>,
    /// Slots settled by the owner itself; never touches the shared head.
    local: VecDeque<u32>,
    ready: VecDeque<Completion>,
    counters: Counters,
    _not_send: PhantomData<Rc<()>>,
}

impl std::fmt::Debug for CompletionPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionPort")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("scope_depth", &self.scopes.depth())
            .field("free", &self.free.len())
            .field("local", &self.local.len())
            .field("ready", &self.ready.len())
            .finish_non_exhaustive()
    }
}

impl CompletionPort {
    /// Builds a port with default configuration, a wall clock, and a reactor
    /// that never completes anything.
    pub fn new() -> Result<Self> {
        PortBuilder::new().build()
    }

    /// Shorthand for [`PortBuilder::new`].
    pub fn builder() -> PortBuilder {
        PortBuilder::new()
    }

    pub(crate) fn from_parts(
        config: PortConfig,
        clock: Arc<dyn TimeSource>,
        reactor: Arc<dyn Reactor>,
    ) -> Result<Self> {
        let capacity = config.op_capacity;
        let table = OpTable::with_capacity(capacity)
            .ok_or_else(|| Error::out_of_memory("operation pool allocation failed"))?;

        let mut meta = Vec::new();
        meta.try_reserve_exact(capacity)
            .map_err(|_| Error::out_of_memory("operation metadata allocation failed"))?;
        meta.resize(capacity, OpMeta::default());

        let mut free = Vec::new();
        free.try_reserve_exact(capacity)
            .map_err(|_| Error::out_of_memory("free list allocation failed"))?;
        // Pop order hands out slot 0 first.
        free.extend((0..table.len() as u32).rev());

        let id = PortId::next();
        let shared = Arc::new(Shared {
            port: id,
            table,
            queue: CompletionQueue::new(),
            clock,
            discarded: Default::default(),
            closed: Default::default(),
        });

        debug!(
            port = %id,
            op_capacity = capacity,
            max_scope_depth = config.max_scope_depth,
            drain_batch = config.drain_batch,
            "completion port created"
        );

        Ok(Self {
            id,
            scopes: ScopeStack::new(id),
            config,
            shared,
            reactor,
            meta,
            free,
            timers: TimerHeap::new(),
            armed_timers: HashMap::new(),
            pending_arm: Vec::new(),
            local: VecDeque::new(),
            ready: VecDeque::new(),
            counters: Counters::default(),
            _not_send: PhantomData,
        })
    }

    /// This port's identity.
    #[must_use]
    pub fn id(&self) -> PortId {
        self.id
    }

    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Current time on the port's clock.
    #[must_use]
    pub fn now(&self) -> Time {
        self.shared.clock.now()
    }

    /// A producer handle for this port.
    #[must_use]
    pub fn sender(&self) -> CompletionSender {
        CompletionSender::new(Arc::clone(&self.shared))
    }

    /// The innermost scope, if any.
    #[must_use]
    pub fn top_scope(&self) -> Option<ScopeId> {
        self.scopes.top()
    }

    /// Number of scopes on the stack.
    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.scopes.depth()
    }

    /// Effective deadline of a live scope.
    pub fn scope_deadline(&self, scope: ScopeId) -> Result<Deadline> {
        self.scope_record(scope).map(|s| s.effective)
    }

    /// Whether a live scope has been cancelled.
    pub fn is_scope_cancelled(&self, scope: ScopeId) -> Result<bool> {
        self.scope_record(scope).map(|s| s.flags.is_cancelled())
    }

    /// Records attributed to a live scope that have not yet been delivered.
    pub fn outstanding(&self, scope: ScopeId) -> Result<usize> {
        self.scope_record(scope).map(|s| s.outstanding.len())
    }

    /// Counters and gauges for this port.
    #[must_use]
    pub fn stats(&self) -> PortStats {
        let capacity = self.shared.table.len();
        PortStats {
            capacity,
            in_flight: capacity - self.free.len(),
            scope_depth: self.scopes.depth(),
            submitted: self.counters.submitted,
            completed: self.counters.completed,
            cancelled: self.counters.cancelled,
            timed_out: self.counters.timed_out,
            discarded: self.shared.discarded.load(Ordering::Relaxed),
        }
    }

    fn scope_record(&self, scope: ScopeId) -> Result<&scope::ScopeRecord> {
        self.scopes
            .get(scope)
            .ok_or_else(|| Error::invalid("scope is not on this port's stack").with_scope(scope))
    }

    /// Effective deadline of a scope that may still take new work.
    ///
    /// A deadline that has passed cancels its scope here rather than waiting
    /// for the next drain.
    fn admitting_deadline(&mut self, scope: ScopeId) -> Result<Deadline> {
        let now = self.now();
        let record = self.scope_record(scope)?;
        if !record.flags.is_cancelled() && record.effective.is_expired(now) {
            self.fire_timers(now);
            if let Some(path) = self
                .scopes
                .get(scope)
                .filter(|s| !s.flags.is_cancelled())
                .and_then(|_| self.scopes.path_to(scope))
            {
                self.cancel_path(&path, &CancelReason::timeout());
            }
        }
        let record = self.scope_record(scope)?;
        if record.flags.is_cancelled() {
            let reason = record.cancel_reason.clone().unwrap_or_default();
            return Err(Error::cancelled(&reason).with_scope(scope));
        }
        Ok(record.effective)
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    /// Opens a scope above the current top.
    ///
    /// `timeout` is relative to now; `None` adds no deadline of its own, but
    /// the scope still inherits its parent's. Fails with `Cancelled` if the
    /// parent has been cancelled, `InvalidArgument` at the depth limit, and
    /// `OutOfMemory` if the scope arena cannot grow.
    pub fn push_scope(&mut self, sequential: bool, timeout: Option<Duration>) -> Result<ScopeId> {
        if self.scopes.depth() >= self.config.max_scope_depth {
            return Err(Error::invalid(format!(
                "scope depth limit of {} reached",
                self.config.max_scope_depth
            )));
        }
        let parent_effective = match self.scopes.top() {
            Some(parent) => self.admitting_deadline(parent)?,
            None => Deadline::NONE,
        };

        let deadline = Deadline::after(self.now(), timeout);
        let id = self
            .scopes
            .push(sequential, deadline)
            .ok_or_else(|| Error::out_of_memory("scope arena exhausted"))?;

        let effective = deadline.meet(parent_effective);
        if effective != parent_effective {
            if let Some(at) = effective.time() {
                self.timers.insert(TimerKey::Scope(id), at);
            }
        }
        debug!(
            port = %self.id,
            scope = %id,
            sequential,
            deadline = %deadline,
            effective = %effective,
            depth = self.scopes.depth(),
            "scope pushed"
        );
        Ok(id)
    }

    /// [`push_scope`](Self::push_scope) with a millisecond timeout, where any
    /// negative value means no deadline.
    pub fn push_scope_ms(&mut self, sequential: bool, timeout_ms: i64) -> Result<ScopeId> {
        self.push_scope(sequential, timeout_from_ms(timeout_ms))
    }

    /// Closes the top scope.
    ///
    /// Records still in flight are cancelled and abandoned at the reactor.
    /// Settled records of a sequential scope that were held for ordering are
    /// released in submission order. Fails with `InvalidArgument` if `scope`
    /// is not the top of this port's stack.
    pub fn pop_scope(&mut self, scope: ScopeId) -> Result<()> {
        if self.scopes.top() != Some(scope) {
            let detail = if self.scopes.get(scope).is_some() {
                "scope is not the top of the stack"
            } else {
                "scope is not on this port's stack"
            };
            return Err(Error::invalid(detail).with_scope(scope));
        }

        let cancelled = self.cancel_outstanding(scope, &CancelReason::scope_popped());
        self.collect();

        let Some(record) = self.scopes.pop_top(scope) else {
            return Err(Error::invalid("scope is not the top of the stack").with_scope(scope));
        };
        self.timers.retain(|key| *key != TimerKey::Scope(scope));
        let mut released = 0usize;
        for op in record.outstanding {
            let held = self
                .meta
                .get_mut(op.slot() as usize)
                .and_then(|m| m.held.take());
            if let Some(status) = held {
                self.deliver(op, status);
                released += 1;
            }
        }
        debug!(
            port = %self.id,
            scope = %scope,
            cancelled,
            released,
            depth = self.scopes.depth(),
            "scope popped"
        );
        Ok(())
    }

    /// Cancels `scope` and every scope nested inside it.
    ///
    /// Affected scopes stop admitting work; their in-flight records complete
    /// with a status derived from `reason`. Cancelling an already cancelled
    /// scope only strengthens the recorded reason.
    pub fn cancel_scope(&mut self, scope: ScopeId, reason: &CancelReason) -> Result<()> {
        let Some(path) = self.scopes.path_to(scope) else {
            return Err(Error::invalid("scope is not on this port's stack").with_scope(scope));
        };
        self.cancel_path(&path, reason);
        Ok(())
    }

    /// `path` runs from the top of the stack down to the target.
    fn cancel_path(&mut self, path: &[ScopeId], reason: &CancelReason) {
        let Some(&target) = path.last() else {
            return;
        };
        let mut total = 0;
        for &sid in path.iter().rev() {
            let scope_reason = if sid == target {
                reason.clone()
            } else {
                CancelReason::parent_cancelled()
            };
            if let Some(record) = self.scopes.get_mut(sid) {
                record.mark_cancelled(&scope_reason);
            }
            total += self.cancel_outstanding(sid, reason);
        }
        debug!(
            port = %self.id,
            scope = %target,
            reason = %reason,
            nested = path.len() - 1,
            cancelled = total,
            "scope cancelled"
        );
    }

    /// Cancels every unsettled record of one scope. Returns how many it won.
    fn cancel_outstanding(&mut self, scope: ScopeId, reason: &CancelReason) -> usize {
        let Some(record) = self.scopes.get(scope) else {
            return 0;
        };
        let ops: Vec<OpId> = record.outstanding.iter().copied().collect();
        let status = Status::from_cancel(reason);

        let mut chain = Vec::with_capacity(ops.len());
        let mut abandon = Vec::new();
        for op in ops {
            let Some(slot) = self.shared.table.get(op.slot()) else {
                continue;
            };
            if slot.try_cancel(op.generation(), status).is_ok() {
                chain.push(op.slot());
                if self.meta[op.slot() as usize].armed {
                    abandon.push(op);
                }
            }
        }
        let won = chain.len();
        self.local.extend(chain);
        for op in abandon {
            self.reactor.abandon(op);
        }
        won
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Allocates a record in the innermost scope and queues it for arming.
    ///
    /// The record inherits the scope's effective deadline; with no scope open
    /// it has none. Fails with `Cancelled` if the innermost scope has been
    /// cancelled, `OutOfMemory` if the pool is exhausted, and
    /// `InvalidArgument` for [`OpCode::Timer`], which is reserved for
    /// [`set_timeout`](Self::set_timeout).
    pub fn submit(&mut self, opcode: OpCode, flags: OpFlags, token: u64) -> Result<OpId> {
        if opcode == OpCode::Timer {
            return Err(Error::invalid("timer records are created by set_timeout"));
        }
        let scope = self.scopes.top();
        let deadline = match scope {
            Some(sid) => self.admitting_deadline(sid)?,
            None => Deadline::NONE,
        };

        let id = self.alloc()?;
        self.meta[id.slot() as usize] = OpMeta {
            opcode,
            flags,
            token,
            scope,
            deadline,
            armed: false,
            held: None,
        };
        if let Some(record) = scope.and_then(|sid| self.scopes.get_mut(sid)) {
            record.outstanding.push_back(id);
        }
        self.pending_arm.push(id);
        self.counters.submitted += 1;
        trace!(
            port = %self.id,
            op = %id,
            opcode = %opcode,
            token,
            deadline = %deadline,
            "operation submitted"
        );
        Ok(id)
    }

    /// Hands every submitted record to the reactor. Returns how many were
    /// armed.
    ///
    /// `drain` does this on every pass; call it directly to start I/O before
    /// draining. Records cancelled before arming are skipped.
    pub fn flush_submissions(&mut self) -> usize {
        if self.pending_arm.is_empty() {
            return 0;
        }
        let pending = std::mem::take(&mut self.pending_arm);
        let now = self.now();
        let mut armed = 0;
        for &id in &pending {
            let live = self
                .shared
                .table
                .get(id.slot())
                .is_some_and(|slot| slot.tag() == (id.generation(), STATE_SUBMITTED));
            if !live {
                continue;
            }
            let meta = &mut self.meta[id.slot() as usize];
            meta.armed = true;
            let op = ArmedOp {
                id,
                opcode: meta.opcode,
                flags: meta.flags,
                token: meta.token,
                deadline: meta.deadline,
                armed_at: now,
                sender: CompletionSender::new(Arc::clone(&self.shared)),
            };
            self.reactor.arm(op);
            armed += 1;
        }
        // Keep the allocation.
        self.pending_arm = pending;
        self.pending_arm.clear();
        if armed > 0 {
            trace!(port = %self.id, armed, "submissions flushed");
        }
        armed
    }

    // ------------------------------------------------------------------
    // Standalone timers
    // ------------------------------------------------------------------

    /// Arms a timer that completes with success after `timeout_ms`.
    ///
    /// The timer belongs to no scope. `token` identifies it to
    /// [`cancel_timeout`](Self::cancel_timeout) and in the delivered
    /// [`Completion`]; a token that is already armed is rejected with
    /// `InvalidArgument`.
    pub fn set_timeout(&mut self, timeout_ms: u64, token: u64) -> Result<OpId> {
        if self.armed_timers.contains_key(&token) {
            return Err(Error::invalid(format!("timer token {token} is already armed")));
        }
        let id = self.alloc()?;
        self.meta[id.slot() as usize] = OpMeta {
            opcode: OpCode::Timer,
            token,
            ..OpMeta::default()
        };
        let at = self.now().saturating_add(Duration::from_millis(timeout_ms));
        self.timers.insert(TimerKey::Timer(id), at);
        self.armed_timers.insert(token, id);
        self.counters.submitted += 1;
        debug!(port = %self.id, op = %id, token, at = %at, "timer armed");
        Ok(id)
    }

    /// Disarms the timer registered under `token`.
    ///
    /// Returns false if no such timer is armed, including one that already
    /// fired. A disarmed timer is never delivered.
    pub fn cancel_timeout(&mut self, token: u64) -> bool {
        let Some(id) = self.armed_timers.remove(&token) else {
            return false;
        };
        self.timers.retain(|key| *key != TimerKey::Timer(id));
        let won = self
            .shared
            .table
            .get(id.slot())
            .is_some_and(|slot| slot.try_cancel(id.generation(), Status::CANCELLED).is_ok());
        if won {
            self.release(id.slot());
        }
        debug!(port = %self.id, op = %id, token, "timer disarmed");
        true
    }

    // ------------------------------------------------------------------
    // Draining
    // ------------------------------------------------------------------

    /// Returns settled completions, waiting up to `max_wait` for the first.
    ///
    /// `None` waits until something settles. `Some(Duration::ZERO)` polls.
    /// Waiting is measured on the port's clock: with a virtual clock the port
    /// jumps straight to the next timer or reactor event instead of sleeping.
    /// At most `drain_batch` completions are returned; the rest stay ready for
    /// the next call.
    pub fn drain(&mut self, max_wait: Option<Duration>) -> Vec<Completion> {
        let start = self.now();
        let wait_until = max_wait.map(|wait| start.saturating_add(wait));
        loop {
            self.poll_once();
            if !self.ready.is_empty() {
                break;
            }
            let now = self.now();
            if wait_until.is_some_and(|limit| now >= limit) {
                break;
            }
            let wake = [
                wait_until,
                self.timers.peek_deadline(),
                self.reactor.next_event(),
            ]
            .into_iter()
            .flatten()
            .min();
            if let Some(target) = wake {
                if self.shared.clock.advance_idle(target) {
                    continue;
                }
            }
            let timeout = wake.map(|target| Duration::from_nanos(target.duration_since(now)));
            trace!(port = %self.id, timeout = ?timeout, "port parking");
            self.shared.queue.park(timeout);
        }
        let take = self.config.drain_batch.min(self.ready.len());
        self.ready.drain(..take).collect()
    }

    /// [`drain`](Self::drain) with a millisecond bound; negative waits until
    /// something settles.
    pub fn drain_ms(&mut self, max_wait_ms: i64) -> Vec<Completion> {
        self.drain(timeout_from_ms(max_wait_ms))
    }

    /// [`drain`](Self::drain) with the configured default wait.
    pub fn drain_default(&mut self) -> Vec<Completion> {
        self.drain(self.config.default_drain_wait)
    }

    /// One non-blocking pass: fire timers, arm, poll the reactor, collect.
    ///
    /// Timers go first so nothing is armed under a scope that is already
    /// past its deadline.
    fn poll_once(&mut self) {
        let now = self.now();
        self.fire_timers(now);
        self.flush_submissions();
        self.reactor.poll(now);
        self.collect();
    }

    fn fire_timers(&mut self, now: Time) {
        for key in self.timers.pop_expired(now) {
            match key {
                TimerKey::Scope(sid) => {
                    let live = self
                        .scopes
                        .get(sid)
                        .is_some_and(|s| !s.flags.is_cancelled() && s.effective.is_expired(now));
                    if !live {
                        continue;
                    }
                    debug!(port = %self.id, scope = %sid, now = %now, "scope deadline expired");
                    if let Some(path) = self.scopes.path_to(sid) {
                        self.cancel_path(&path, &CancelReason::timeout());
                    }
                }
                TimerKey::Timer(op) => {
                    let Some(token) = self.meta.get(op.slot() as usize).map(|m| m.token) else {
                        continue;
                    };
                    if self.armed_timers.get(&token) != Some(&op) {
                        continue;
                    }
                    self.armed_timers.remove(&token);
                    let fired = self
                        .shared
                        .table
                        .get(op.slot())
                        .is_some_and(|slot| slot.try_complete(op.generation(), Status::OK, now).is_ok());
                    if fired {
                        self.local.push_back(op.slot());
                        trace!(port = %self.id, op = %op, token, "timer fired");
                    }
                }
            }
        }
    }

    /// Settles the owner's own completions, then everything producers have
    /// queued.
    fn collect(&mut self) {
        while let Some(index) = self.local.pop_front() {
            self.settle_popped(index);
        }
        for index in self.shared.queue.pop_all(&self.shared.table) {
            self.settle_popped(index);
        }
    }

    fn settle_popped(&mut self, index: u32) {
        let Some(slot) = self.shared.table.get(index) else {
            return;
        };
        let (generation, state) = slot.tag();
        let id = OpId::new(self.id, index, generation);
        let meta = self.meta[index as usize];
        let mut status = slot.status();
        match state {
            STATE_COMPLETED => {
                if status.is_success() && meta.deadline.is_expired(slot.completed_at()) {
                    debug!(
                        port = %self.id,
                        op = %id,
                        completed_at = %slot.completed_at(),
                        deadline = %meta.deadline,
                        "success reported past deadline"
                    );
                    status = Status::TIMED_OUT;
                }
            }
            STATE_CANCELLED => {}
            _ => {
                warn!(port = %self.id, op = %id, state, "queued record in unexpected state");
                return;
            }
        }
        self.settle(id, meta.scope, status);
    }

    fn settle(&mut self, id: OpId, scope: Option<ScopeId>, status: Status) {
        if let Some(record) = scope.and_then(|sid| self.scopes.get_mut(sid)) {
            if record.flags.is_sequential() {
                self.meta[id.slot() as usize].held = Some(status);
                let sid = record.id;
                self.release_in_order(sid);
                return;
            }
            if let Some(pos) = record.outstanding.iter().position(|op| *op == id) {
                record.outstanding.remove(pos);
            }
        }
        self.deliver(id, status);
    }

    /// Delivers held records from the front of a sequential scope.
    fn release_in_order(&mut self, scope: ScopeId) {
        loop {
            let Some(record) = self.scopes.get_mut(scope) else {
                return;
            };
            let Some(&front) = record.outstanding.front() else {
                return;
            };
            let Some(status) = self.meta[front.slot() as usize].held.take() else {
                return;
            };
            record.outstanding.pop_front();
            self.deliver(front, status);
        }
    }

    fn deliver(&mut self, id: OpId, status: Status) {
        let meta = self.meta[id.slot() as usize];
        if status.is_timed_out() {
            self.counters.timed_out += 1;
        } else if status.is_cancelled() {
            self.counters.cancelled += 1;
        } else {
            self.counters.completed += 1;
        }
        trace!(port = %self.id, op = %id, status = %status, token = meta.token, "operation delivered");
        self.ready.push_back(Completion {
            id,
            opcode: meta.opcode,
            status,
            token: meta.token,
            scope: meta.scope,
        });
        self.release(id.slot());
    }

    fn alloc(&mut self) -> Result<OpId> {
        let Some(index) = self.free.pop() else {
            return Err(Error::out_of_memory(format!(
                "all {} operation records are in use",
                self.shared.table.len()
            )));
        };
        let Some(slot) = self.shared.table.get(index) else {
            return Err(Error::invalid("free list holds an out-of-range slot"));
        };
        Ok(OpId::new(self.id, index, slot.arm()))
    }

    fn release(&mut self, index: u32) {
        if let Some(slot) = self.shared.table.get(index) {
            slot.release();
        }
        self.meta[index as usize] = OpMeta::default();
        self.free.push(index);
    }
}

impl Drop for CompletionPort {
    fn drop(&mut self) {
        while let Some(top) = self.scopes.top() {
            if self.pop_scope(top).is_err() {
                break;
            }
        }
        // Scope-less records still at the reactor.
        let mut abandon = Vec::new();
        for (index, meta) in self.meta.iter().enumerate() {
            if !meta.armed {
                continue;
            }
            let Some(slot) = self.shared.table.get(index as u32) else {
                continue;
            };
            let (generation, _) = slot.tag();
            if slot.try_cancel(generation, Status::CANCELLED).is_ok() {
                abandon.push(OpId::new(self.id, index as u32, generation));
            }
        }
        for op in abandon {
            self.reactor.abandon(op);
        }
        self.shared.closed.store(true, Ordering::Release);
        debug!(
            port = %self.id,
            undelivered = self.ready.len(),
            discarded = self.shared.discarded.load(Ordering::Relaxed),
            "completion port closed"
        );
    }
}
