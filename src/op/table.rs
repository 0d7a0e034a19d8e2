//! Fixed table of operation record slots shared with producers.
//!
//! Each slot carries the atomics a producer may touch: the queue link, the
//! status word, the completion timestamp, and a tag packing the slot
//! generation with its lifecycle state. Everything else about a record is
//! owned by the port thread and never shared.
//!
//! # State machine
//!
//! ```text
//!   FREE(g) --arm--> SUBMITTED(g) --complete--> COMPLETED(g) --release--> FREE(g+1)
//!                         |
//!                         +--------cancel-----> CANCELLED(g) --release--> FREE(g+1)
//! ```
//!
//! Only the owner arms and releases. `complete` and `cancel` race through a
//! single CAS on the tag, so exactly one of them claims the record and writes
//! its status.

use crate::types::{Status, Time};
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

pub(crate) const STATE_FREE: u32 = 0;
pub(crate) const STATE_SUBMITTED: u32 = 1;
pub(crate) const STATE_COMPLETED: u32 = 2;
pub(crate) const STATE_CANCELLED: u32 = 3;

const fn pack(generation: u32, state: u32) -> u64 {
    ((generation as u64) << 32) | state as u64
}

const fn unpack(tag: u64) -> (u32, u32) {
    ((tag >> 32) as u32, tag as u32)
}

/// What a failed claim found in the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    /// Same generation, already completed by a producer.
    Completed,
    /// Same generation, already cancelled by the owner.
    Cancelled,
    /// The slot moved on to another generation, or was never armed.
    Stale,
}

#[derive(Debug)]
pub(crate) struct OpSlot {
    /// Queue link: 0 terminates the chain, otherwise `slot index + 1`.
    pub(crate) next: AtomicU32,
    tag: AtomicU64,
    status: AtomicI32,
    completed_at: AtomicU64,
}

impl OpSlot {
    fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
            tag: AtomicU64::new(pack(0, STATE_FREE)),
            status: AtomicI32::new(Status::PENDING.raw()),
            completed_at: AtomicU64::new(0),
        }
    }

    /// Current `(generation, state)`.
    pub(crate) fn tag(&self) -> (u32, u32) {
        unpack(self.tag.load(Ordering::Acquire))
    }

    /// Owner only: moves a free slot to `SUBMITTED` and returns its generation.
    pub(crate) fn arm(&self) -> u32 {
        let (generation, _) = self.tag();
        self.status.store(Status::PENDING.raw(), Ordering::Relaxed);
        self.next.store(0, Ordering::Relaxed);
        self.tag
            .store(pack(generation, STATE_SUBMITTED), Ordering::Release);
        generation
    }

    /// Claims the record for a completion with `status` stamped at `at`.
    pub(crate) fn try_complete(&self, generation: u32, status: Status, at: Time) -> Result<(), Claim> {
        self.claim(generation, STATE_COMPLETED)?;
        self.status.store(status.raw(), Ordering::Relaxed);
        self.completed_at.store(at.as_nanos(), Ordering::Relaxed);
        Ok(())
    }

    /// Owner only: claims the record for cancellation with `status`.
    pub(crate) fn try_cancel(&self, generation: u32, status: Status) -> Result<(), Claim> {
        self.claim(generation, STATE_CANCELLED)?;
        self.status.store(status.raw(), Ordering::Relaxed);
        Ok(())
    }

    fn claim(&self, generation: u32, to: u32) -> Result<(), Claim> {
        let expected = pack(generation, STATE_SUBMITTED);
        match self.tag.compare_exchange(
            expected,
            pack(generation, to),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(found) => Err(match unpack(found) {
                (g, STATE_COMPLETED) if g == generation => Claim::Completed,
                (g, STATE_CANCELLED) if g == generation => Claim::Cancelled,
                _ => Claim::Stale,
            }),
        }
    }

    /// Status written by whoever claimed the record.
    pub(crate) fn status(&self) -> Status {
        Status::from_stored(self.status.load(Ordering::Relaxed))
    }

    /// When a producer completed the record.
    pub(crate) fn completed_at(&self) -> Time {
        Time::from_nanos(self.completed_at.load(Ordering::Relaxed))
    }

    /// Owner only: returns a consumed slot to `FREE` under the next generation.
    pub(crate) fn release(&self) {
        let (generation, _) = self.tag();
        self.tag.store(
            pack(generation.wrapping_add(1), STATE_FREE),
            Ordering::Release,
        );
    }
}

/// The fixed record table.
#[derive(Debug)]
pub(crate) struct OpTable {
    slots: Box<[OpSlot]>,
}

impl OpTable {
    /// Allocates `capacity` slots, or `None` if the allocation fails.
    pub(crate) fn with_capacity(capacity: usize) -> Option<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).ok()?;
        slots.extend((0..capacity).map(|_| OpSlot::new()));
        Some(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    pub(crate) fn get(&self, index: u32) -> Option<&OpSlot> {
        self.slots.get(index as usize)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> OpTable {
        OpTable::with_capacity(4).expect("alloc")
    }

    #[test]
    fn complete_then_release_bumps_generation() {
        let table = table();
        let slot = table.get(1).expect("slot");
        let generation = slot.arm();
        assert_eq!(slot.tag(), (generation, STATE_SUBMITTED));

        slot.try_complete(generation, Status::from_raw(7), Time::from_millis(3))
            .expect("claim");
        assert_eq!(slot.status().raw(), 7);
        assert_eq!(slot.completed_at(), Time::from_millis(3));

        slot.release();
        assert_eq!(slot.tag(), (generation + 1, STATE_FREE));
    }

    #[test]
    fn cancel_and_complete_race_has_one_winner() {
        let table = table();
        let slot = table.get(0).expect("slot");
        let generation = slot.arm();
        slot.try_cancel(generation, Status::CANCELLED).expect("cancel");
        assert_eq!(
            slot.try_complete(generation, Status::OK, Time::ZERO),
            Err(Claim::Cancelled)
        );
        assert!(slot.status().is_cancelled());
    }

    #[test]
    fn second_completion_is_detected() {
        let table = table();
        let slot = table.get(2).expect("slot");
        let generation = slot.arm();
        slot.try_complete(generation, Status::OK, Time::ZERO)
            .expect("first");
        assert_eq!(
            slot.try_complete(generation, Status::OK, Time::ZERO),
            Err(Claim::Completed)
        );
    }

    #[test]
    fn stale_generation_cannot_claim() {
        let table = table();
        let slot = table.get(3).expect("slot");
        let old = slot.arm();
        slot.try_cancel(old, Status::CANCELLED).expect("cancel");
        slot.release();
        let new = slot.arm();
        assert_ne!(old, new);
        assert_eq!(
            slot.try_complete(old, Status::OK, Time::ZERO),
            Err(Claim::Stale)
        );
        assert_eq!(slot.tag(), (new, STATE_SUBMITTED));
        assert!(slot.status().is_pending());
    }

    #[test]
    fn out_of_range_slot_is_none() {
        let table = table();
        assert_eq!(table.len(), 4);
        assert!(table.get(4).is_none());
    }
}
