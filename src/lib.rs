//! ioscope: per-thread completion ports with scoped deadlines.
//!
//! # Overview
//!
//! A [`CompletionPort`] is a single-consumer event port bound to the thread
//! that built it. Work is submitted as operation records inside nested
//! scopes; a reactor performs the I/O and reports results through a
//! [`CompletionSender`], which any thread may hold. The port drains finished
//! records in bounded batches.
//!
//! # Core Guarantees
//!
//! - **Deadlines only tighten**: a scope's effective deadline is the earlier of
//!   its own and its parent's
//! - **Cancellation propagates down**: cancelling a scope cancels every scope
//!   nested inside it along with their in-flight records
//! - **One outcome per record**: completion and cancellation race on an atomic
//!   state word; exactly one wins and the record is delivered once
//! - **Lock-free producers**: completions are spliced into an intrusive MPSC
//!   queue with a single CAS, in batches if desired
//! - **Deterministic testing**: a virtual clock and a scripted reactor make
//!   deadline behavior reproducible
//!
//! # Module Structure
//!
//! - [`port`]: the completion port, its builder, scopes, and producer handle
//! - [`op`]: opcodes, flags, and delivered completions
//! - [`reactor`]: the I/O boundary, with a no-op and a lab implementation
//! - [`task`]: tasks that own a root scope
//! - [`time`]: clocks and the timer heap
//! - [`types`]: identifiers, deadlines, statuses, cancel reasons
//! - [`config`]: layered port configuration
//! - [`error`]: error types
//!
//! # Example
//!
//! ```
//! use ioscope::{CompletionPort, OpCode, OpFlags};
//! use std::time::Duration;
//!
//! let mut port = CompletionPort::new().unwrap();
//! let scope = port.push_scope(false, Some(Duration::from_millis(5))).unwrap();
//! port.submit(OpCode::Recv, OpFlags::NONE, 1).unwrap();
//!
//! // Nothing completes the receive, so the deadline cancels it.
//! let done = port.drain(None);
//! assert!(done[0].status.is_timed_out());
//! port.pop_scope(scope).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod op;
pub mod port;
pub mod reactor;
pub mod task;
pub mod time;
pub mod tracing_compat;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{ConfigError, PortConfig};
pub use error::{Error, ErrorKind, Recoverability, Result};
pub use op::{Completion, Delivery, OpCode, OpFlags};
pub use port::{CompletionPort, CompletionSender, PortBuilder, PortStats, ScopeFlags};
pub use reactor::{ArmedOp, LabReactor, NoopReactor, Reactor};
pub use task::Task;
pub use time::{TimeSource, VirtualClock, WallClock};
pub use types::{
    CancelKind, CancelReason, Deadline, OpId, PortId, ScopeId, Status, TaskId, Time,
};
