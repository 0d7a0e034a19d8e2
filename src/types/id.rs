//! Identifier types for port entities.
//!
//! Scopes and operation records are addressed by generational indices so a
//! stale handle can never alias a recycled slot. Every handle also carries the
//! [`PortId`] it was issued by, which lets a port reject handles that belong to
//! another port.

use crate::util::ArenaIndex;
use core::fmt;
use std::ops::Add;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

static PORT_COUNTER: AtomicU32 = AtomicU32::new(1);
static TASK_COUNTER: AtomicU32 = AtomicU32::new(1);

/// A unique identifier for a completion port.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(u32);

impl PortId {
    /// Allocates a fresh process-wide port identifier.
    pub(crate) fn next() -> Self {
        Self(PORT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a port ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortId({})", self.0)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// A handle to a scope on a port's scope stack.
///
/// Scope handles are only meaningful to the port that issued them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId {
    port: PortId,
    index: ArenaIndex,
}

impl ScopeId {
    pub(crate) const fn new(port: PortId, index: ArenaIndex) -> Self {
        Self { port, index }
    }

    /// Creates a scope ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(port: u32, index: u32, generation: u32) -> Self {
        Self {
            port: PortId(port),
            index: ArenaIndex::new(index, generation),
        }
    }

    /// Returns the port that issued this handle.
    #[must_use]
    pub const fn port(self) -> PortId {
        self.port
    }

    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.index
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScopeId({}:{}:{})",
            self.port,
            self.index.index(),
            self.index.generation()
        )
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.index.index())
    }
}

/// A handle to an operation record in a port's record table.
///
/// The generation changes every time the slot is recycled, so a producer
/// holding an old `OpId` cannot complete a newer operation by accident.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId {
    port: PortId,
    slot: u32,
    generation: u32,
}

impl OpId {
    pub(crate) const fn new(port: PortId, slot: u32, generation: u32) -> Self {
        Self {
            port,
            slot,
            generation,
        }
    }

    /// Creates an operation ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(port: u32, slot: u32, generation: u32) -> Self {
        Self {
            port: PortId(port),
            slot,
            generation,
        }
    }

    /// Returns the port that issued this handle.
    #[must_use]
    pub const fn port(self) -> PortId {
        self.port
    }

    /// Returns the record slot index.
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Returns the slot generation at submission time.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpId({}:{}:{})", self.port, self.slot, self.generation)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.slot)
    }
}

/// A unique identifier for a task.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u32);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(TASK_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// A monotonic timestamp.
///
/// Measured in nanoseconds since the epoch of the port's [`TimeSource`]
/// (creation of a [`WallClock`], or zero for a [`VirtualClock`]).
///
/// [`TimeSource`]: crate::time::TimeSource
/// [`WallClock`]: crate::time::WallClock
/// [`VirtualClock`]: crate::time::VirtualClock
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(u64);

impl Time {
    /// The zero instant (epoch).
    pub const ZERO: Self = Self(0);

    /// The maximum representable instant.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a new time from nanoseconds since epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a new time from milliseconds since epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Creates a new time from seconds since epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Returns the time as nanoseconds since epoch.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the time as milliseconds since epoch (truncated).
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    /// Adds a duration in nanoseconds, saturating on overflow.
    #[must_use]
    pub const fn saturating_add_nanos(self, nanos: u64) -> Self {
        Self(self.0.saturating_add(nanos))
    }

    /// Adds a duration, saturating on overflow.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.saturating_add_nanos(nanos)
    }

    /// Returns the duration between two times in nanoseconds.
    ///
    /// Returns 0 if `self` is before `earlier`.
    #[must_use]
    pub const fn duration_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000_000 {
            write!(
                f,
                "{}.{:03}s",
                self.0 / 1_000_000_000,
                (self.0 / 1_000_000) % 1000
            )
        } else if self.0 >= 1_000_000 {
            write!(f, "{}ms", self.0 / 1_000_000)
        } else if self.0 >= 1_000 {
            write!(f, "{}us", self.0 / 1_000)
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_conversions() {
        assert_eq!(Time::from_secs(1).as_nanos(), 1_000_000_000);
        assert_eq!(Time::from_millis(1).as_nanos(), 1_000_000);
        assert_eq!(Time::from_nanos(1_500_000_000).as_millis(), 1500);
    }

    #[test]
    fn time_add_saturates() {
        let t = Time::MAX + Duration::from_secs(1);
        assert_eq!(t, Time::MAX);
        let t = Time::from_millis(10) + Duration::from_millis(5);
        assert_eq!(t, Time::from_millis(15));
        assert_eq!(Time::from_millis(10).duration_since(Time::from_millis(15)), 0);
    }

    #[test]
    fn time_display_scales_units() {
        assert_eq!(Time::from_nanos(12).to_string(), "12ns");
        assert_eq!(Time::from_millis(50).to_string(), "50ms");
        assert_eq!(Time::from_millis(1_250).to_string(), "1.250s");
    }

    #[test]
    fn handles_display_compactly() {
        let scope = ScopeId::new_for_test(7, 3, 1);
        assert_eq!(scope.to_string(), "S3");
        assert_eq!(format!("{scope:?}"), "ScopeId(P7:3:1)");
        let op = OpId::new_for_test(7, 12, 4);
        assert_eq!(op.to_string(), "O12");
        assert_eq!(op.port(), PortId::new_for_test(7));
    }

    #[test]
    fn port_ids_are_unique() {
        let a = PortId::next();
        let b = PortId::next();
        assert_ne!(a, b);
    }
}
