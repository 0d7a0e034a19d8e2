//! Completion status codes.
//!
//! A [`Status`] is the signed result word written into an operation record
//! exactly once when it completes. Zero and positive values are success (for
//! data transfers, the byte count); negative values are a negated errno.
//!
//! `i32::MIN` is reserved as the pending sentinel. A completion can never
//! publish it: [`Status::from_raw`] maps it to [`Status::UNKNOWN`].

use super::cancel::CancelReason;
use core::fmt;
use std::io;

/// Signed completion status of an operation record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(i32);

impl Status {
    /// Successful completion with no payload.
    pub const OK: Self = Self(0);
    /// Sentinel stored in a record that has not completed yet.
    pub const PENDING: Self = Self(i32::MIN);
    /// Failure whose cause could not be expressed as an errno.
    pub const UNKNOWN: Self = Self(i32::MIN + 1);
    /// The operation was cancelled.
    pub const CANCELLED: Self = Self(-libc::ECANCELED);
    /// The operation's deadline passed.
    pub const TIMED_OUT: Self = Self(-libc::ETIMEDOUT);

    /// Builds a status from a raw completion value.
    ///
    /// The pending sentinel is not a valid completion and becomes
    /// [`Status::UNKNOWN`].
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        if raw == i32::MIN {
            Self::UNKNOWN
        } else {
            Self(raw)
        }
    }

    pub(crate) const fn from_stored(raw: i32) -> Self {
        Self(raw)
    }

    /// Builds a failure status from a positive errno value.
    #[must_use]
    pub const fn from_errno(errno: i32) -> Self {
        if errno <= 0 {
            Self::UNKNOWN
        } else {
            Self(-errno)
        }
    }

    /// Builds a success status carrying a transfer length.
    ///
    /// Lengths beyond `i32::MAX` saturate.
    #[must_use]
    pub fn from_len(len: usize) -> Self {
        Self(i32::try_from(len).unwrap_or(i32::MAX))
    }

    /// The status an operation receives when its scope is cancelled.
    #[must_use]
    pub const fn from_cancel(reason: &CancelReason) -> Self {
        if reason.is_timeout() {
            Self::TIMED_OUT
        } else {
            Self::CANCELLED
        }
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Returns true for zero and positive values.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Returns true for any failure, including cancellation and timeout.
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 < 0 && self.0 != i32::MIN
    }

    /// Returns true for the pending sentinel.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        self.0 == i32::MIN
    }

    /// Returns true if the operation was cancelled.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        self.0 == Self::CANCELLED.0
    }

    /// Returns true if the operation timed out.
    #[must_use]
    pub const fn is_timed_out(self) -> bool {
        self.0 == Self::TIMED_OUT.0
    }

    /// Returns the errno for a failure status.
    #[must_use]
    pub const fn errno(self) -> Option<i32> {
        if self.is_error() && self.0 != Self::UNKNOWN.0 {
            Some(-self.0)
        } else {
            None
        }
    }

    /// Converts a failure status into an [`io::Error`].
    ///
    /// Returns `None` for success or pending.
    #[must_use]
    pub fn to_io_error(self) -> Option<io::Error> {
        if !self.is_error() {
            return None;
        }
        Some(match self.errno() {
            Some(errno) => io::Error::from_raw_os_error(errno),
            None => io::Error::other("unknown completion failure"),
        })
    }
}

impl From<io::ErrorKind> for Status {
    fn from(kind: io::ErrorKind) -> Self {
        let errno = match kind {
            io::ErrorKind::NotFound => libc::ENOENT,
            io::ErrorKind::PermissionDenied => libc::EACCES,
            io::ErrorKind::ConnectionRefused => libc::ECONNREFUSED,
            io::ErrorKind::ConnectionReset => libc::ECONNRESET,
            io::ErrorKind::ConnectionAborted => libc::ECONNABORTED,
            io::ErrorKind::NotConnected => libc::ENOTCONN,
            io::ErrorKind::AddrInUse => libc::EADDRINUSE,
            io::ErrorKind::AddrNotAvailable => libc::EADDRNOTAVAIL,
            io::ErrorKind::BrokenPipe => libc::EPIPE,
            io::ErrorKind::AlreadyExists => libc::EEXIST,
            io::ErrorKind::WouldBlock => libc::EAGAIN,
            io::ErrorKind::InvalidInput => libc::EINVAL,
            io::ErrorKind::TimedOut => libc::ETIMEDOUT,
            io::ErrorKind::Interrupted => libc::EINTR,
            io::ErrorKind::Unsupported => libc::EOPNOTSUPP,
            io::ErrorKind::OutOfMemory => libc::ENOMEM,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::WriteZero => libc::EIO,
            _ => return Self::UNKNOWN,
        };
        Self::from_errno(errno)
    }
}

impl From<&io::Error> for Status {
    fn from(err: &io::Error) -> Self {
        err.raw_os_error()
            .map_or_else(|| Self::from(err.kind()), Self::from_errno)
    }
}

impl From<io::Error> for Status {
    fn from(err: io::Error) -> Self {
        Self::from(&err)
    }
}

impl<T> From<io::Result<T>> for Status
where
    T: TryInto<i32>,
{
    fn from(res: io::Result<T>) -> Self {
        match res {
            Ok(n) => n.try_into().map_or(Self(i32::MAX), Self::from_raw),
            Err(err) => Self::from(&err),
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PENDING => write!(f, "Status(pending)"),
            Self::UNKNOWN => write!(f, "Status(unknown)"),
            Self::CANCELLED => write!(f, "Status(cancelled)"),
            Self::TIMED_OUT => write!(f, "Status(timed out)"),
            Self(n) if n >= 0 => write!(f, "Status(ok {n})"),
            Self(n) => write!(f, "Status(errno {})", -n),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PENDING => write!(f, "pending"),
            Self::UNKNOWN => write!(f, "unknown failure"),
            Self(n) if n >= 0 => write!(f, "ok({n})"),
            other => match other.to_io_error() {
                Some(err) => write!(f, "{err}"),
                None => write!(f, "{}", other.0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CancelKind;

    #[test]
    fn pending_sentinel_is_never_published() {
        assert_eq!(Status::from_raw(i32::MIN), Status::UNKNOWN);
        assert!(!Status::from_raw(i32::MIN).is_pending());
        assert!(Status::PENDING.is_pending());
        assert!(!Status::PENDING.is_error());
        assert!(!Status::PENDING.is_success());
    }

    #[test]
    fn cancel_reason_maps_to_errno() {
        assert!(Status::from_cancel(&CancelReason::timeout()).is_timed_out());
        assert!(Status::from_cancel(&CancelReason::user("x")).is_cancelled());
        assert!(Status::from_cancel(&CancelReason::new(CancelKind::ScopePopped)).is_cancelled());
        assert_eq!(Status::CANCELLED.errno(), Some(libc::ECANCELED));
    }

    #[test]
    fn io_error_round_trips_errno() {
        let err = io::Error::from_raw_os_error(libc::ECONNRESET);
        let status = Status::from(&err);
        assert_eq!(status.errno(), Some(libc::ECONNRESET));
        let back = status.to_io_error().expect("failure");
        assert_eq!(back.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn io_kind_without_errno_uses_table() {
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "closed");
        assert_eq!(Status::from(err).errno(), Some(libc::EPIPE));
        let err = io::Error::other("opaque");
        assert_eq!(Status::from(err), Status::UNKNOWN);
        assert_eq!(Status::UNKNOWN.errno(), None);
    }

    #[test]
    fn io_result_success_carries_length() {
        let ok: io::Result<usize> = Ok(512);
        assert_eq!(Status::from(ok).raw(), 512);
        let too_big: io::Result<u64> = Ok(u64::MAX);
        assert_eq!(Status::from(too_big).raw(), i32::MAX);
        assert_eq!(Status::from_len(usize::MAX).raw(), i32::MAX);
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(Status::from_raw(3).to_string(), "ok(3)");
        assert_eq!(format!("{:?}", Status::TIMED_OUT), "Status(timed out)");
        assert!(Status::from_errno(libc::EINVAL).to_string().contains("nvalid"));
    }
}
