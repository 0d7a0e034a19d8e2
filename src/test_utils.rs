//! Test utilities for ioscope.
//!
//! Shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Deterministic port constructors over a virtual clock and lab reactor

use crate::port::{CompletionPort, PortBuilder};
use crate::reactor::LabReactor;
use crate::time::VirtualClock;
use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A port wired to a virtual clock and a scripted reactor.
pub(crate) struct LabPort {
    pub port: CompletionPort,
    pub clock: Arc<VirtualClock>,
    pub reactor: Arc<LabReactor>,
}

/// Builds a [`LabPort`] with the given record capacity.
pub(crate) fn lab_port(op_capacity: usize) -> LabPort {
    init_test_logging();
    let clock = Arc::new(VirtualClock::new());
    let reactor = Arc::new(LabReactor::new());
    let port = PortBuilder::new()
        .op_capacity(op_capacity)
        .time_source(clock.clone())
        .reactor(reactor.clone())
        .build()
        .expect("failed to build lab port");
    LabPort {
        port,
        clock,
        reactor,
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that a completion carries the expected status predicate.
#[macro_export]
macro_rules! assert_status {
    ($completion:expr, success) => {
        assert!(
            $completion.status.is_success(),
            "expected success, got {:?}",
            $completion
        )
    };
    ($completion:expr, cancelled) => {
        assert!(
            $completion.status.is_cancelled(),
            "expected cancelled, got {:?}",
            $completion
        )
    };
    ($completion:expr, timed_out) => {
        assert!(
            $completion.status.is_timed_out(),
            "expected timed out, got {:?}",
            $completion
        )
    };
}
