//! Absolute deadlines with meet semantics.
//!
//! A [`Deadline`] is either an absolute [`Time`] or "no deadline". Deadlines
//! combine with [`meet`](Deadline::meet), which keeps the earlier instant and
//! treats "no deadline" as the identity:
//!
//! | `a`        | `b`        | `a.meet(b)`  |
//! |------------|------------|--------------|
//! | none       | none       | none         |
//! | `t`        | none       | `t`          |
//! | `t1`       | `t2`       | `min(t1,t2)` |
//!
//! Meet is how a scope inherits its parent's deadline: the effective deadline
//! of a nested scope can only stay equal or get tighter, never looser.
//!
//! ```
//! # use ioscope::types::{Deadline, Time};
//! let outer = Deadline::at(Time::from_millis(20));
//! let inner = Deadline::at(Time::from_millis(1_000));
//! assert_eq!(inner.meet(outer), Deadline::at(Time::from_millis(20)));
//! ```

use super::id::Time;
use core::fmt;
use std::time::Duration;

/// An optional absolute deadline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Deadline(Option<Time>);

impl Deadline {
    /// No deadline; the identity for [`meet`](Self::meet).
    pub const NONE: Self = Self(None);

    /// A deadline at the given absolute time.
    #[must_use]
    pub const fn at(time: Time) -> Self {
        Self(Some(time))
    }

    /// A deadline `timeout` after `now`, or none when `timeout` is `None`.
    #[must_use]
    pub fn after(now: Time, timeout: Option<Duration>) -> Self {
        Self(timeout.map(|t| now.saturating_add(t)))
    }

    /// A deadline from a millisecond timeout where any negative value means
    /// "no deadline".
    #[must_use]
    pub fn from_timeout_ms(now: Time, timeout_ms: i64) -> Self {
        Self::after(now, timeout_from_ms(timeout_ms))
    }

    /// Returns the absolute time, if any.
    #[must_use]
    pub const fn time(self) -> Option<Time> {
        self.0
    }

    /// Returns true when there is no deadline.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0.is_none()
    }

    /// Combines two deadlines, keeping the earlier one.
    #[must_use]
    pub fn meet(self, other: Self) -> Self {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Self(Some(a.min(b))),
            (Some(a), None) | (None, Some(a)) => Self(Some(a)),
            (None, None) => Self::NONE,
        }
    }

    /// Returns true once `now` has reached the deadline.
    ///
    /// A deadline is never expired before its instant.
    #[must_use]
    pub fn is_expired(self, now: Time) -> bool {
        self.0.is_some_and(|t| now >= t)
    }

    /// Time left until the deadline, saturating at zero.
    ///
    /// Returns `None` when there is no deadline.
    #[must_use]
    pub fn remaining(self, now: Time) -> Option<Duration> {
        self.0
            .map(|t| Duration::from_nanos(t.duration_since(now)))
    }
}

/// Converts a millisecond timeout where negative means "wait forever".
#[must_use]
pub fn timeout_from_ms(timeout_ms: i64) -> Option<Duration> {
    u64::try_from(timeout_ms).ok().map(Duration::from_millis)
}

impl From<Time> for Deadline {
    fn from(time: Time) -> Self {
        Self::at(time)
    }
}

impl fmt::Debug for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(t) => write!(f, "Deadline({t:?})"),
            None => write!(f, "Deadline(none)"),
        }
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(t) => write!(f, "{t}"),
            None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meet_keeps_earlier() {
        let a = Deadline::at(Time::from_millis(10));
        let b = Deadline::at(Time::from_millis(30));
        assert_eq!(a.meet(b), a);
        assert_eq!(b.meet(a), a);
    }

    #[test]
    fn none_is_identity() {
        let a = Deadline::at(Time::from_millis(10));
        assert_eq!(a.meet(Deadline::NONE), a);
        assert_eq!(Deadline::NONE.meet(a), a);
        assert_eq!(Deadline::NONE.meet(Deadline::NONE), Deadline::NONE);
    }

    #[test]
    fn negative_timeout_means_no_deadline() {
        let now = Time::from_millis(5);
        assert!(Deadline::from_timeout_ms(now, -1).is_none());
        assert_eq!(
            Deadline::from_timeout_ms(now, 50),
            Deadline::at(Time::from_millis(55))
        );
        assert_eq!(
            Deadline::from_timeout_ms(now, 0),
            Deadline::at(now),
            "zero timeout expires immediately"
        );
    }

    #[test]
    fn never_expires_early() {
        let d = Deadline::at(Time::from_millis(50));
        assert!(!d.is_expired(Time::from_nanos(49_999_999)));
        assert!(d.is_expired(Time::from_millis(50)));
        assert!(d.is_expired(Time::from_millis(51)));
        assert!(!Deadline::NONE.is_expired(Time::MAX));
    }

    #[test]
    fn remaining_saturates() {
        let d = Deadline::at(Time::from_millis(50));
        assert_eq!(
            d.remaining(Time::from_millis(20)),
            Some(Duration::from_millis(30))
        );
        assert_eq!(d.remaining(Time::from_millis(80)), Some(Duration::ZERO));
        assert_eq!(Deadline::NONE.remaining(Time::ZERO), None);
    }
}
