//! Logging facade for the port internals.
//!
//! With the `tracing-integration` feature (on by default) the macros below are
//! the ones from the `tracing` crate. Without it they expand to nothing, so a
//! port built without logging pays nothing for the call sites.
//!
//! ```rust,ignore
//! use ioscope::tracing_compat::{debug, trace};
//!
//! debug!(scope = ?id, deadline = %deadline, "scope pushed");
//! trace!(op = ?op, "completion queued");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
