//! Port configuration.
//!
//! [`PortConfig`] holds the concrete values that size and tune a
//! [`CompletionPort`](crate::port::CompletionPort). Most callers go through
//! [`PortBuilder`](crate::port::PortBuilder), which layers the sources below.
//!
//! # Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`op_capacity(256)`)
//! 2. **Environment variables**: `IOSCOPE_*` variables, when the builder
//!    opts in with `with_env()`
//! 3. **Config file**: a TOML file (requires the `config-file` feature)
//! 4. **Defaults**: [`PortConfig::default()`]
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `op_capacity` | 1024 |
//! | `max_scope_depth` | 64 |
//! | `drain_batch` | 0 (whole queue) |
//! | `default_drain_wait` | `None` (until the next completion or deadline) |
//!
//! # Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `IOSCOPE_OP_CAPACITY` | `usize` | `op_capacity` |
//! | `IOSCOPE_MAX_SCOPE_DEPTH` | `usize` | `max_scope_depth` |
//! | `IOSCOPE_DRAIN_BATCH` | `usize` | `drain_batch` |
//! | `IOSCOPE_DRAIN_WAIT_MS` | `i64` (negative = unbounded) | `default_drain_wait` |

use crate::types::deadline::timeout_from_ms;
use std::time::Duration;
use thiserror::Error;

/// Environment variable name for the record pool capacity.
pub const ENV_OP_CAPACITY: &str = "IOSCOPE_OP_CAPACITY";
/// Environment variable name for the maximum scope nesting depth.
pub const ENV_MAX_SCOPE_DEPTH: &str = "IOSCOPE_MAX_SCOPE_DEPTH";
/// Environment variable name for the per-drain record limit.
pub const ENV_DRAIN_BATCH: &str = "IOSCOPE_DRAIN_BATCH";
/// Environment variable name for the default drain wait in milliseconds.
pub const ENV_DRAIN_WAIT_MS: &str = "IOSCOPE_DRAIN_WAIT_MS";

/// Largest record pool a port accepts.
///
/// Slot links are stored as `index + 1` in a `u32`, with `u32::MAX` reserved
/// for the parked marker.
pub const MAX_OP_CAPACITY: usize = (u32::MAX - 2) as usize;

/// Errors raised while assembling a [`PortConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The record pool must hold at least one record.
    #[error("op_capacity must be at least 1")]
    ZeroCapacity,
    /// The record pool exceeds the addressable slot range.
    #[error("op_capacity {requested} exceeds the maximum of {max}")]
    CapacityTooLarge {
        /// Requested capacity.
        requested: usize,
        /// Largest accepted capacity.
        max: usize,
    },
    /// Scopes could never be pushed.
    #[error("max_scope_depth must be at least 1")]
    ZeroScopeDepth,
    /// An environment variable is set but does not parse.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value found.
        value: String,
        /// Description of the accepted form.
        expected: &'static str,
    },
    /// A config file could not be read or parsed.
    #[error("config file: {0}")]
    File(String),
}

/// Port configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    /// Number of operation records in the fixed pool, including armed timers.
    pub op_capacity: usize,
    /// Maximum number of scopes on the stack at once.
    pub max_scope_depth: usize,
    /// Maximum completions returned by one drain; 0 means no limit.
    pub drain_batch: usize,
    /// Wait used by drains that do not pass an explicit bound.
    pub default_drain_wait: Option<Duration>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            op_capacity: 1024,
            max_scope_depth: 64,
            drain_batch: 0,
            default_drain_wait: None,
        }
    }
}

impl PortConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.drain_batch == 0 || self.drain_batch > self.op_capacity {
            self.drain_batch = self.op_capacity;
        }
    }

    /// Checks hard limits. Call before [`normalize`](Self::normalize).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.op_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.op_capacity > MAX_OP_CAPACITY {
            return Err(ConfigError::CapacityTooLarge {
                requested: self.op_capacity,
                max: MAX_OP_CAPACITY,
            });
        }
        if self.max_scope_depth == 0 {
            return Err(ConfigError::ZeroScopeDepth);
        }
        Ok(())
    }

    /// Defaults overlaid with any `IOSCOPE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        Ok(config)
    }
}

/// Apply environment variable overrides to a [`PortConfig`].
///
/// Only variables that are set are applied. A set but unparseable variable is
/// an error rather than being ignored.
pub fn apply_env_overrides(config: &mut PortConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_OP_CAPACITY) {
        config.op_capacity = parse_usize(ENV_OP_CAPACITY, &val)?;
    }
    if let Some(val) = read_env(ENV_MAX_SCOPE_DEPTH) {
        config.max_scope_depth = parse_usize(ENV_MAX_SCOPE_DEPTH, &val)?;
    }
    if let Some(val) = read_env(ENV_DRAIN_BATCH) {
        config.drain_batch = parse_usize(ENV_DRAIN_BATCH, &val)?;
    }
    if let Some(val) = read_env(ENV_DRAIN_WAIT_MS) {
        config.default_drain_wait = timeout_from_ms(parse_i64(ENV_DRAIN_WAIT_MS, &val)?);
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnv {
            var,
            value: val.to_string(),
            expected: "unsigned integer",
        })
}

fn parse_i64(var: &'static str, val: &str) -> Result<i64, ConfigError> {
    val.trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidEnv {
            var,
            value: val.to_string(),
            expected: "integer milliseconds",
        })
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable port configuration.
///
/// ```toml
/// [port]
/// op_capacity = 4096
/// max_scope_depth = 32
/// drain_batch = 256
/// drain_wait_ms = 50
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct PortTomlConfig {
    /// Port settings.
    #[serde(default)]
    pub port: PortToml,
}

/// `[port]` section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct PortToml {
    /// Record pool capacity.
    pub op_capacity: Option<usize>,
    /// Maximum scope depth.
    pub max_scope_depth: Option<usize>,
    /// Per-drain record limit.
    pub drain_batch: Option<usize>,
    /// Default drain wait; negative means unbounded.
    pub drain_wait_ms: Option<i64>,
}

/// Apply a parsed TOML config. Only `Some` fields override.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut PortConfig, toml: &PortTomlConfig) {
    if let Some(v) = toml.port.op_capacity {
        config.op_capacity = v;
    }
    if let Some(v) = toml.port.max_scope_depth {
        config.max_scope_depth = v;
    }
    if let Some(v) = toml.port.drain_batch {
        config.drain_batch = v;
    }
    if let Some(v) = toml.port.drain_wait_ms {
        config.default_drain_wait = timeout_from_ms(v);
    }
}

/// Parse a TOML string into a [`PortTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<PortTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::File(format!("parse error: {e}")))
}

/// Read and parse a TOML file into a [`PortTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<PortTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::File(format!("failed to read {}: {e}", path.display())))?;
    parse_toml_str(&content)
}
