//! Scope records and the per-port scope stack.
//!
//! Scopes live in an arena owned by the port; the `prev` link is a generational
//! handle, so the stack can only be unwound from the top and a handle to a
//! popped scope is recognisably stale.

use crate::types::{CancelReason, Deadline, OpId, PortId, ScopeId};
use crate::util::Arena;
use std::collections::VecDeque;

/// Scope flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScopeFlags(u8);

impl ScopeFlags {
    /// No flags.
    pub const NONE: ScopeFlags = ScopeFlags(0);
    /// Completions are delivered in submission order.
    pub const SEQUENTIAL: ScopeFlags = ScopeFlags(0b01);
    /// The scope has been cancelled and admits no new work.
    pub const CANCELLED: ScopeFlags = ScopeFlags(0b10);

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: ScopeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if the sequential flag is set.
    #[must_use]
    pub const fn is_sequential(self) -> bool {
        self.contains(Self::SEQUENTIAL)
    }

    /// Returns true if the cancelled flag is set.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        self.contains(Self::CANCELLED)
    }

    /// Combines flags.
    #[must_use]
    pub const fn add(self, other: ScopeFlags) -> Self {
        ScopeFlags(self.0 | other.0)
    }
}

/// One scope on the stack.
#[derive(Debug)]
pub(crate) struct ScopeRecord {
    pub(crate) id: ScopeId,
    pub(crate) prev: Option<ScopeId>,
    pub(crate) deadline: Deadline,
    /// `deadline` met with the parent's effective deadline.
    pub(crate) effective: Deadline,
    pub(crate) flags: ScopeFlags,
    pub(crate) cancel_reason: Option<CancelReason>,
    /// Records attributed to this scope, in submission order.
    pub(crate) outstanding: VecDeque<OpId>,
}

impl ScopeRecord {
    /// Marks the scope cancelled, keeping the most severe reason.
    pub(crate) fn mark_cancelled(&mut self, reason: &CancelReason) {
        self.flags = self.flags.add(ScopeFlags::CANCELLED);
        match &mut self.cancel_reason {
            Some(existing) => {
                existing.strengthen(reason);
            }
            None => self.cancel_reason = Some(reason.clone()),
        }
    }
}

/// The per-port scope stack.
#[derive(Debug)]
pub(crate) struct ScopeStack {
    port: PortId,
    arena: Arena<ScopeRecord>,
    top: Option<ScopeId>,
    depth: usize,
}

impl ScopeStack {
    pub(crate) fn new(port: PortId) -> Self {
        Self {
            port,
            arena: Arena::new(),
            top: None,
            depth: 0,
        }
    }

    pub(crate) const fn top(&self) -> Option<ScopeId> {
        self.top
    }

    pub(crate) const fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn get(&self, id: ScopeId) -> Option<&ScopeRecord> {
        if id.port() != self.port {
            return None;
        }
        self.arena.get(id.arena_index())
    }

    pub(crate) fn get_mut(&mut self, id: ScopeId) -> Option<&mut ScopeRecord> {
        if id.port() != self.port {
            return None;
        }
        self.arena.get_mut(id.arena_index())
    }

    /// Pushes a scope above the current top.
    ///
    /// Returns `None` if the arena cannot grow.
    pub(crate) fn push(&mut self, sequential: bool, deadline: Deadline) -> Option<ScopeId> {
        let prev = self.top;
        let parent_effective = prev
            .and_then(|p| self.get(p))
            .map_or(Deadline::NONE, |p| p.effective);
        let flags = if sequential {
            ScopeFlags::SEQUENTIAL
        } else {
            ScopeFlags::NONE
        };
        let port = self.port;
        let index = self.arena.try_insert_with(|index| ScopeRecord {
            id: ScopeId::new(port, index),
            prev,
            deadline,
            effective: deadline.meet(parent_effective),
            flags,
            cancel_reason: None,
            outstanding: VecDeque::new(),
        })?;
        let id = ScopeId::new(port, index);
        self.top = Some(id);
        self.depth += 1;
        Some(id)
    }

    /// Removes the top scope. The caller has already checked `id` is the top.
    pub(crate) fn pop_top(&mut self, id: ScopeId) -> Option<ScopeRecord> {
        if self.top != Some(id) {
            return None;
        }
        let record = self.arena.remove(id.arena_index())?;
        self.top = record.prev;
        self.depth -= 1;
        Some(record)
    }

    /// Scopes from the top down to and including `id`.
    ///
    /// Returns `None` if `id` is not on the stack.
    pub(crate) fn path_to(&self, id: ScopeId) -> Option<Vec<ScopeId>> {
        let mut path = Vec::new();
        let mut cursor = self.top;
        while let Some(current) = cursor {
            path.push(current);
            if current == id {
                return Some(path);
            }
            cursor = self.get(current).and_then(|s| s.prev);
        }
        None
    }
}
