//! Port builder.
//!
//! [`PortBuilder`] resolves a [`PortConfig`] from its layered sources and wires
//! the collaborators a port runs against: the clock and the reactor.
//!
//! ```
//! use ioscope::PortBuilder;
//! use std::time::Duration;
//!
//! let port = PortBuilder::new()
//!     .op_capacity(256)
//!     .max_scope_depth(16)
//!     .default_drain_wait(Some(Duration::from_millis(5)))
//!     .build()
//!     .unwrap();
//! assert_eq!(port.config().op_capacity, 256);
//! ```

use super::CompletionPort;
use crate::config::{self, PortConfig};
use crate::error::Result;
use crate::reactor::{NoopReactor, Reactor};
use crate::time::{TimeSource, WallClock};
use std::sync::Arc;
use std::time::Duration;

/// Values set through builder methods. They win over every other source.
#[derive(Debug, Clone, Default)]
struct Overrides {
    op_capacity: Option<usize>,
    max_scope_depth: Option<usize>,
    drain_batch: Option<usize>,
    default_drain_wait: Option<Option<Duration>>,
}

/// Builder for [`CompletionPort`].
#[must_use]
pub struct PortBuilder {
    base: PortConfig,
    overrides: Overrides,
    use_env: bool,
    #[cfg(feature = "config-file")]
    config_file: Option<std::path::PathBuf>,
    clock: Option<Arc<dyn TimeSource>>,
    reactor: Option<Arc<dyn Reactor>>,
}

impl std::fmt::Debug for PortBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortBuilder")
            .field("base", &self.base)
            .field("overrides", &self.overrides)
            .field("use_env", &self.use_env)
            .field("custom_clock", &self.clock.is_some())
            .field("custom_reactor", &self.reactor.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for PortBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PortBuilder {
    /// Starts from [`PortConfig::default()`], a wall clock, and a reactor that
    /// never completes anything.
    pub fn new() -> Self {
        Self {
            base: PortConfig::default(),
            overrides: Overrides::default(),
            use_env: false,
            #[cfg(feature = "config-file")]
            config_file: None,
            clock: None,
            reactor: None,
        }
    }

    /// Replaces the default layer with `config`.
    pub fn config(mut self, config: PortConfig) -> Self {
        self.base = config;
        self
    }

    /// Number of operation records the port can hold at once.
    pub fn op_capacity(mut self, capacity: usize) -> Self {
        self.overrides.op_capacity = Some(capacity);
        self
    }

    /// Deepest scope nesting accepted by `push_scope`.
    pub fn max_scope_depth(mut self, depth: usize) -> Self {
        self.overrides.max_scope_depth = Some(depth);
        self
    }

    /// Upper bound on completions returned by one `drain` call. Zero means the
    /// whole pool.
    pub fn drain_batch(mut self, batch: usize) -> Self {
        self.overrides.drain_batch = Some(batch);
        self
    }

    /// Wait bound used by `drain_default`. `None` waits for the next event.
    pub fn default_drain_wait(mut self, wait: Option<Duration>) -> Self {
        self.overrides.default_drain_wait = Some(wait);
        self
    }

    /// Applies `IOSCOPE_*` environment variables below programmatic values.
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    /// Reads a TOML file below environment and programmatic values.
    #[cfg(feature = "config-file")]
    pub fn config_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Clock used for deadlines, timers, and drain bounds.
    pub fn time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Reactor that performs the port's operations.
    pub fn reactor(mut self, reactor: Arc<dyn Reactor>) -> Self {
        self.reactor = Some(reactor);
        self
    }

    /// Resolves the layered configuration without building a port.
    pub fn resolve(&self) -> Result<PortConfig> {
        let mut resolved = self.base.clone();

        #[cfg(feature = "config-file")]
        if let Some(path) = &self.config_file {
            let file = config::parse_toml_file(path)?;
            config::apply_toml_config(&mut resolved, &file);
        }

        if self.use_env {
            config::apply_env_overrides(&mut resolved)?;
        }

        let o = &self.overrides;
        if let Some(v) = o.op_capacity {
            resolved.op_capacity = v;
        }
        if let Some(v) = o.max_scope_depth {
            resolved.max_scope_depth = v;
        }
        if let Some(v) = o.drain_batch {
            resolved.drain_batch = v;
        }
        if let Some(v) = o.default_drain_wait {
            resolved.default_drain_wait = v;
        }

        resolved.validate()?;
        resolved.normalize();
        Ok(resolved)
    }

    /// Builds the port on the calling thread.
    ///
    /// Fails with `InvalidArgument` for an invalid configuration and with
    /// `OutOfMemory` if the record pool cannot be allocated.
    pub fn build(self) -> Result<CompletionPort> {
        let config = self.resolve()?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(WallClock::new()) as Arc<dyn TimeSource>);
        let reactor = self
            .reactor
            .unwrap_or_else(|| Arc::new(NoopReactor) as Arc<dyn Reactor>);
        CompletionPort::from_parts(config, clock, reactor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{env_lock, init_test_logging};

    #[test]
    fn programmatic_values_win_over_env() {
        init_test_logging();
        let _guard = env_lock();
        std::env::set_var(config::ENV_OP_CAPACITY, "64");
        std::env::set_var(config::ENV_MAX_SCOPE_DEPTH, "4");
        let resolved = PortBuilder::new()
            .with_env()
            .op_capacity(32)
            .resolve();
        std::env::remove_var(config::ENV_OP_CAPACITY);
        std::env::remove_var(config::ENV_MAX_SCOPE_DEPTH);

        let resolved = resolved.expect("resolve");
        assert_eq!(resolved.op_capacity, 32);
        assert_eq!(resolved.max_scope_depth, 4);
        assert_eq!(resolved.drain_batch, 32, "zero batch means the whole pool");
    }

    #[test]
    fn env_is_ignored_without_opt_in() {
        let _guard = env_lock();
        std::env::set_var(config::ENV_OP_CAPACITY, "7");
        let resolved = PortBuilder::new().resolve();
        std::env::remove_var(config::ENV_OP_CAPACITY);
        assert_eq!(resolved.expect("resolve").op_capacity, 1024);
    }

    #[test]
    fn invalid_config_is_invalid_argument() {
        let err = PortBuilder::new().op_capacity(0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = PortBuilder::new().max_scope_depth(0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn oversized_batch_is_clamped() {
        let resolved = PortBuilder::new()
            .op_capacity(8)
            .drain_batch(100)
            .resolve()
            .expect("resolve");
        assert_eq!(resolved.drain_batch, 8);
    }
}
