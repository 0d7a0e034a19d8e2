//! Operation records: opcodes, modifier flags, and delivered completions.
//!
//! The record storage itself lives in [`table`]; this module holds the
//! plain-data types that flow between submitters, the reactor, and the
//! consumer.

pub(crate) mod table;

use crate::types::{OpId, ScopeId, Status};
use core::fmt;

/// What an operation record asks the reactor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Completes without doing anything.
    Nop = 0,
    /// Waits for readiness on a source.
    Poll = 1,
    /// Receives from a socket.
    Recv = 2,
    /// Sends on a socket.
    Send = 3,
    /// Reads from a file or stream.
    Read = 4,
    /// Writes to a file or stream.
    Write = 5,
    /// Standalone timer armed by [`set_timeout`](crate::CompletionPort::set_timeout).
    Timer = 6,
}

impl OpCode {
    /// Returns the raw opcode byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a raw opcode byte.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Nop,
            1 => Self::Poll,
            2 => Self::Recv,
            3 => Self::Send,
            4 => Self::Read,
            5 => Self::Write,
            6 => Self::Timer,
            _ => return None,
        })
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nop => "nop",
            Self::Poll => "poll",
            Self::Recv => "recv",
            Self::Send => "send",
            Self::Read => "read",
            Self::Write => "write",
            Self::Timer => "timer",
        };
        f.write_str(name)
    }
}

/// Modifier flags passed through to the reactor.
///
/// The port does not interpret these; they travel with the armed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpFlags(u32);

impl OpFlags {
    /// No modifiers.
    pub const NONE: OpFlags = OpFlags(0);
    /// Fail with `EAGAIN` instead of waiting for readiness.
    pub const NONBLOCKING: OpFlags = OpFlags(1 << 0);
    /// Check readiness before attempting the transfer.
    pub const POLL_FIRST: OpFlags = OpFlags(1 << 1);
    /// Ask the reactor to service this operation ahead of others.
    pub const PRIORITY: OpFlags = OpFlags(1 << 2);

    const ALL: u32 = 0b111;

    /// Builds flags from raw bits, dropping unknown bits.
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        OpFlags(bits & Self::ALL)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: OpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Combines flags.
    #[must_use]
    pub const fn add(self, other: OpFlags) -> Self {
        OpFlags(self.0 | other.0)
    }

    /// Removes flags.
    #[must_use]
    pub const fn remove(self, other: OpFlags) -> Self {
        OpFlags(self.0 & !other.0)
    }
}

impl std::ops::BitOr for OpFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.add(rhs)
    }
}

/// Packs an opcode and flags into one word: low 8 bits opcode, the rest flags.
#[must_use]
pub const fn pack_op(opcode: OpCode, flags: OpFlags) -> u32 {
    (flags.0 << 8) | opcode as u32
}

/// Splits a packed word. Returns `None` for an unknown opcode byte.
#[must_use]
pub const fn unpack_op(word: u32) -> Option<(OpCode, OpFlags)> {
    match OpCode::from_u8((word & 0xFF) as u8) {
        Some(op) => Some((op, OpFlags::from_bits_truncate(word >> 8))),
        None => None,
    }
}

/// A finished operation handed back by [`drain`](crate::CompletionPort::drain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// The record that completed. Its slot has already been recycled.
    pub id: OpId,
    /// What the record asked for.
    pub opcode: OpCode,
    /// Final status: success, errno, cancellation, or timeout.
    pub status: Status,
    /// The submitter's token.
    pub token: u64,
    /// The scope the record was attributed to; `None` for standalone timers.
    pub scope: Option<ScopeId>,
}

/// Outcome of reporting a completion from a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The record was queued for the owner.
    Queued,
    /// The record had already been cancelled or recycled; the status is dropped.
    Discarded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips_through_byte() {
        for op in [
            OpCode::Nop,
            OpCode::Poll,
            OpCode::Recv,
            OpCode::Send,
            OpCode::Read,
            OpCode::Write,
            OpCode::Timer,
        ] {
            assert_eq!(OpCode::from_u8(op.as_u8()), Some(op));
        }
        assert_eq!(OpCode::from_u8(7), None);
        assert_eq!(OpCode::Nop.as_u8(), 0);
    }

    #[test]
    fn packed_word_keeps_opcode_in_low_byte() {
        let flags = OpFlags::NONBLOCKING | OpFlags::PRIORITY;
        let word = pack_op(OpCode::Recv, flags);
        assert_eq!(word & 0xFF, 2);
        assert_eq!(unpack_op(word), Some((OpCode::Recv, flags)));
        assert_eq!(unpack_op(0xFF), None);
    }

    #[test]
    fn flags_set_operations() {
        let flags = OpFlags::NONE.add(OpFlags::POLL_FIRST);
        assert!(flags.contains(OpFlags::POLL_FIRST));
        assert!(!flags.contains(OpFlags::NONBLOCKING));
        assert_eq!(flags.remove(OpFlags::POLL_FIRST), OpFlags::NONE);
        assert_eq!(OpFlags::from_bits_truncate(u32::MAX).bits(), 0b111);
    }
}
