//! Time sources and deadline bookkeeping.
//!
//! - [`TimeSource`]: the clock a port reads, with [`WallClock`] for
//!   production and [`VirtualClock`] for deterministic tests
//! - [`TimerHeap`]: min-heap of pending deadlines
//!
//! # Virtual vs Wall Time
//!
//! Every deadline comparison uses the port's injected clock. When a port with
//! a virtual clock goes idle with a bounded wait, it jumps the clock to the
//! next wake-up instead of sleeping, which makes timeout tests instant and
//! reproducible.

mod clock;
mod timer_heap;

pub use clock::{TimeSource, VirtualClock, WallClock};
pub use timer_heap::TimerHeap;
