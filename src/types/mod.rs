//! Core types shared by the port, its scopes, and its producers.
//!
//! - [`id`]: identifier types (`PortId`, `ScopeId`, `OpId`, `TaskId`, `Time`)
//! - [`deadline`]: optional absolute deadlines with meet semantics
//! - [`cancel`]: cancellation reason and kind types
//! - [`status`]: signed completion status codes

pub mod cancel;
pub mod deadline;
pub mod id;
pub mod status;

pub use cancel::{CancelKind, CancelReason};
pub use deadline::Deadline;
pub use id::{OpId, PortId, ScopeId, TaskId, Time};
pub use status::Status;
