//! Error types for port operations.
//!
//! Errors are reported synchronously only for misuse and exhaustion. I/O
//! failures never surface here: they arrive later as a negative
//! [`Status`](crate::types::Status) on the completed record.
//!
//! # Error Kinds
//!
//! - **InvalidArgument**: misused handles, popping a non-top scope, a second
//!   completion of the same record, calls from a thread that does not own the
//!   port, bad configuration
//! - **OutOfMemory**: the record pool or scope arena cannot grow
//! - **Timeout**: a deadline passed (normally a terminal status, not an error)
//! - **Cancelled**: the target scope was torn down
//!
//! # Recovery Classification
//!
//! Every kind maps to a [`Recoverability`]. Only exhaustion is transient: a
//! caller may retry after draining completions and releasing records.

use core::fmt;

use crate::types::{CancelReason, OpId, ScopeId};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A handle, argument, or call sequence is invalid.
    InvalidArgument,
    /// A fixed pool or allocation was exhausted.
    OutOfMemory,
    /// A deadline passed.
    Timeout,
    /// The scope the call targeted has been cancelled.
    Cancelled,
}

impl ErrorKind {
    /// Returns the recoverability classification for this error kind.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        match self {
            Self::OutOfMemory => Recoverability::Transient,
            Self::InvalidArgument | Self::Cancelled => Recoverability::Permanent,
            Self::Timeout => Recoverability::Unknown,
        }
    }

    /// Returns true if this error is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.recoverability(), Recoverability::Transient)
    }
}

/// Classification of error recoverability for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recoverability {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Permanent failure that will not succeed on retry.
    Permanent,
    /// Recoverability depends on context.
    Unknown,
}

/// Diagnostic context for an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The scope involved in the error.
    pub scope_id: Option<ScopeId>,
    /// The operation record involved in the error.
    pub op_id: Option<OpId>,
}

/// The main error type for port operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            context: ErrorContext {
                scope_id: None,
                op_id: None,
            },
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error is a deadline condition.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Attaches the scope involved.
    #[must_use]
    pub fn with_scope(mut self, scope: ScopeId) -> Self {
        self.context.scope_id = Some(scope);
        self
    }

    /// Attaches the operation record involved.
    #[must_use]
    pub fn with_op(mut self, op: OpId) -> Self {
        self.context.op_id = Some(op);
        self
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_message(detail)
    }

    /// Creates an exhaustion error.
    #[must_use]
    pub fn out_of_memory(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfMemory).with_message(detail)
    }

    /// Creates a cancellation error from a structured reason.
    #[must_use]
    pub fn cancelled(reason: &CancelReason) -> Self {
        Self::new(ErrorKind::Cancelled).with_message(reason.to_string())
    }

    /// Returns the recoverability classification.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        self.kind.recoverability()
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the error context.
    #[must_use]
    pub const fn context(&self) -> &ErrorContext {
        &self.context
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(scope) = self.context.scope_id {
            write!(f, " (scope {scope})")?;
        }
        if let Some(op) = self.context.op_id {
            write!(f, " (op {op})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::invalid(err.to_string())
    }
}

/// A specialized Result type for port operations.
pub type Result<T> = core::result::Result<T, Error>;
