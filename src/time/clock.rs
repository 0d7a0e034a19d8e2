//! Monotonic time sources.
//!
//! A port reads time only through [`TimeSource`], so deadline behavior can be
//! tested against a [`VirtualClock`] that moves only when told to.

use crate::types::Time;
use std::sync::atomic::{AtomicU64, Ordering};

/// Time source abstraction for getting the current time.
pub trait TimeSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Time;

    /// Lets an idle port skip ahead to `target` instead of sleeping.
    ///
    /// Returns `true` if the clock jumped, in which case the port re-checks its
    /// timers immediately. Real clocks return `false` and the port blocks.
    fn advance_idle(&self, _target: Time) -> bool {
        false
    }
}

/// Wall clock time source for production use.
///
/// The epoch is the instant the clock was created.
#[derive(Debug)]
pub struct WallClock {
    epoch: std::time::Instant,
}

impl WallClock {
    /// Creates a new wall clock time source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> Time {
        let nanos = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        Time::from_nanos(nanos)
    }
}

/// Virtual time source for deterministic tests.
///
/// Time advances only through [`advance`](Self::advance),
/// [`advance_to`](Self::advance_to), [`set`](Self::set), or when an idle port
/// jumps it forward to its next wake-up.
///
/// ```
/// use ioscope::time::{TimeSource, VirtualClock};
/// use ioscope::types::Time;
///
/// let clock = VirtualClock::new();
/// assert_eq!(clock.now(), Time::ZERO);
///
/// clock.advance(1_000_000_000);
/// assert_eq!(clock.now(), Time::from_secs(1));
/// ```
#[derive(Debug)]
pub struct VirtualClock {
    now: AtomicU64,
}

impl VirtualClock {
    /// Creates a new virtual clock starting at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
        }
    }

    /// Creates a virtual clock starting at the given time.
    #[must_use]
    pub fn starting_at(time: Time) -> Self {
        Self {
            now: AtomicU64::new(time.as_nanos()),
        }
    }

    /// Advances time by the given number of nanoseconds.
    pub fn advance(&self, nanos: u64) {
        self.now.fetch_add(nanos, Ordering::Release);
    }

    /// Advances time to the given absolute time.
    ///
    /// If the target time is in the past, this is a no-op.
    pub fn advance_to(&self, time: Time) {
        self.now.fetch_max(time.as_nanos(), Ordering::AcqRel);
    }

    /// Sets the current time.
    pub fn set(&self, time: Time) {
        self.now.store(time.as_nanos(), Ordering::Release);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Time {
        Time::from_nanos(self.now.load(Ordering::Acquire))
    }

    fn advance_idle(&self, target: Time) -> bool {
        self.advance_to(target);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn wall_clock_is_monotonic() {
        let clock = WallClock::new();
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(1));
        let b = clock.now();
        assert!(b > a);
        assert!(!clock.advance_idle(Time::MAX));
    }

    #[test]
    fn virtual_clock_never_goes_backwards_on_advance_to() {
        let clock = VirtualClock::starting_at(Time::from_millis(10));
        clock.advance_to(Time::from_millis(5));
        assert_eq!(clock.now(), Time::from_millis(10));
        clock.advance_to(Time::from_millis(25));
        assert_eq!(clock.now(), Time::from_millis(25));
        assert!(clock.advance_idle(Time::from_millis(40)));
        assert_eq!(clock.now(), Time::from_millis(40));
        clock.set(Time::ZERO);
        assert_eq!(clock.now(), Time::ZERO);
    }
}
