//! Lock-free MPSC completion queue.
//!
//! The queue is an intrusive stack threaded through the `next` links of the
//! record table. Producers splice chains onto the head with a CAS; the single
//! consumer detaches the whole stack with one swap and reverses it, so records
//! come out in linearization order.
//!
//! # Head encoding
//!
//! | value | meaning |
//! |-------|---------|
//! | `EMPTY` (0) | nothing queued, consumer awake |
//! | `PARKED` (`u32::MAX`) | nothing queued, consumer asleep or about to sleep |
//! | `n` | slot `n - 1` is the newest queued record |
//!
//! The consumer sleeps only after moving `EMPTY` to `PARKED`. A producer that
//! replaces `PARKED` treats it as an empty list and unparks the consumer, so a
//! completion can never slip in between the consumer's last check and its
//! sleep. While the consumer is busy nobody pays for an unpark.

use super::parker::Parker;
use crate::op::table::OpTable;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub(crate) const EMPTY: u32 = 0;
pub(crate) const PARKED: u32 = u32::MAX;

#[derive(Debug)]
pub(crate) struct CompletionQueue {
    head: AtomicU32,
    parker: Parker,
}

impl CompletionQueue {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicU32::new(EMPTY),
            parker: Parker::new(),
        }
    }

    /// Splices `chain` onto the queue with a single CAS.
    ///
    /// `chain` is in delivery order. Returns `true` if the consumer was parked
    /// and has been woken.
    pub(crate) fn push_chain(&self, table: &OpTable, chain: &[u32]) -> bool {
        let (Some(&oldest), Some(&newest)) = (chain.first(), chain.last()) else {
            return false;
        };
        // Link newest -> ... -> oldest; the reversal on pop restores order.
        for pair in chain.windows(2) {
            if let Some(slot) = table.get(pair[1]) {
                slot.next.store(pair[0] + 1, Ordering::Relaxed);
            }
        }
        let Some(tail) = table.get(oldest) else {
            return false;
        };

        let mut current = self.head.load(Ordering::Relaxed);
        loop {
            let below = if current == PARKED { EMPTY } else { current };
            tail.next.store(below, Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                current,
                newest + 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        if current == PARKED {
            self.parker.unpark();
            true
        } else {
            false
        }
    }

    /// Consumer only: detaches everything queued, oldest first.
    pub(crate) fn pop_all(&self, table: &OpTable) -> Vec<u32> {
        let head = self.head.swap(EMPTY, Ordering::Acquire);
        let mut out = Vec::new();
        let mut link = if head == PARKED { EMPTY } else { head };
        while link != EMPTY {
            let index = link - 1;
            out.push(index);
            link = table
                .get(index)
                .map_or(EMPTY, |slot| slot.next.load(Ordering::Relaxed));
        }
        out.reverse();
        out
    }

    /// Consumer only: returns true if something is queued.
    pub(crate) fn has_pending(&self) -> bool {
        !matches!(self.head.load(Ordering::Acquire), EMPTY | PARKED)
    }

    /// Consumer only: sleeps until a producer pushes or `timeout` elapses.
    ///
    /// Returns immediately if the queue is not empty.
    pub(crate) fn park(&self, timeout: Option<Duration>) {
        if self
            .head
            .compare_exchange(EMPTY, PARKED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        match timeout {
            Some(duration) => {
                self.parker.park_timeout(duration);
            }
            None => self.parker.park(),
        }
        // A producer may already have replaced PARKED with its chain.
        let _ = self
            .head
            .compare_exchange(PARKED, EMPTY, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Wakes a parked consumer without queuing anything.
    pub(crate) fn notify(&self) {
        if self
            .head
            .compare_exchange(PARKED, EMPTY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.parker.unpark();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn table(n: usize) -> OpTable {
        OpTable::with_capacity(n).expect("alloc")
    }

    #[test]
    fn pop_all_is_fifo() {
        let table = table(8);
        let queue = CompletionQueue::new();
        for i in [3, 1, 4, 0] {
            queue.push_chain(&table, &[i]);
        }
        assert!(queue.has_pending());
        assert_eq!(queue.pop_all(&table), vec![3, 1, 4, 0]);
        assert!(!queue.has_pending());
        assert!(queue.pop_all(&table).is_empty());
    }

    #[test]
    fn chain_push_keeps_batch_order() {
        let table = table(8);
        let queue = CompletionQueue::new();
        queue.push_chain(&table, &[7]);
        queue.push_chain(&table, &[2, 5, 6]);
        queue.push_chain(&table, &[0]);
        assert_eq!(queue.pop_all(&table), vec![7, 2, 5, 6, 0]);
    }

    #[test]
    fn empty_chain_is_a_no_op() {
        let table = table(2);
        let queue = CompletionQueue::new();
        assert!(!queue.push_chain(&table, &[]));
        assert!(!queue.has_pending());
    }

    #[test]
    fn park_returns_immediately_when_non_empty() {
        let table = table(2);
        let queue = CompletionQueue::new();
        queue.push_chain(&table, &[1]);
        queue.park(None);
        assert_eq!(queue.pop_all(&table), vec![1]);
    }

    #[test]
    fn push_wakes_parked_consumer() {
        let table = Arc::new(table(2));
        let queue = Arc::new(CompletionQueue::new());
        let (t, q) = (table.clone(), queue.clone());
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            q.push_chain(&t, &[0]);
        });
        while !queue.has_pending() {
            queue.park(Some(Duration::from_secs(5)));
        }
        producer.join().expect("producer panicked");
        assert_eq!(queue.pop_all(&table), vec![0]);
    }

    #[test]
    fn park_timeout_restores_empty_head() {
        let table = table(1);
        let queue = CompletionQueue::new();
        queue.park(Some(Duration::from_millis(1)));
        assert!(!queue.has_pending());
        queue.push_chain(&table, &[0]);
        assert_eq!(queue.pop_all(&table), vec![0]);
    }
}
