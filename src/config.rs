//! Graph configuration
//!
//! One `GraphConfig` is fixed when a `Graph` is created; every node of that
//! graph follows the same execution policy.

use crate::error::{Error, Result};
use std::str::FromStr;

/// Environment variable selecting the execution policy (`lazy` or `eager`)
pub const ENV_EXECUTION: &str = "NDGRAD_EXECUTION";
/// Environment variable for the parallel threshold, in elements
pub const ENV_PARALLEL_MIN_LEN: &str = "NDGRAD_PARALLEL_MIN_LEN";
/// Environment variable toggling the shape cache (`1`/`0`, `true`/`false`, `on`/`off`)
pub const ENV_SHAPE_CACHE: &str = "NDGRAD_SHAPE_CACHE";

/// Default element count at which kernels go parallel
pub const DEFAULT_PARALLEL_MIN_LEN: usize = 4096;

/// When forward kernels run
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// Nodes are materialized on first read
    #[default]
    Lazy,
    /// Nodes are materialized as soon as they are constructed
    Eager,
}

impl FromStr for ExecutionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" => Ok(Self::Lazy),
            "eager" => Ok(Self::Eager),
            other => Err(Error::invalid_argument(
                "execution",
                format!("expected 'lazy' or 'eager', got '{other}'"),
            )),
        }
    }
}

/// Per-graph settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphConfig {
    /// Lazy or eager materialization
    pub execution: ExecutionPolicy,
    /// Buffers shorter than this run kernels on the calling thread
    pub parallel_min_len: usize,
    /// Memoize shape inference per (op, operand shapes, params) key
    pub shape_cache: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionPolicy::Lazy,
            parallel_min_len: DEFAULT_PARALLEL_MIN_LEN,
            shape_cache: true,
        }
    }
}

impl GraphConfig {
    /// Start from the defaults
    pub fn builder() -> GraphConfigBuilder {
        GraphConfigBuilder::default()
    }

    /// Defaults overridden by `NDGRAD_*` environment variables
    ///
    /// Unset variables keep their default; malformed values are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_EXECUTION) {
            config.execution = v.parse()?;
        }
        if let Some(v) = lookup(ENV_PARALLEL_MIN_LEN) {
            config.parallel_min_len = v.trim().parse().map_err(|_| {
                Error::invalid_argument(
                    "parallel_min_len",
                    format!("expected a non-negative integer, got '{v}'"),
                )
            })?;
        }
        if let Some(v) = lookup(ENV_SHAPE_CACHE) {
            config.shape_cache = parse_flag(&v)?;
        }
        Ok(config)
    }
}

fn parse_flag(v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(Error::invalid_argument(
            "shape_cache",
            format!("expected a boolean flag, got '{other}'"),
        )),
    }
}

/// Builder for [`GraphConfig`]
#[derive(Clone, Debug, Default)]
pub struct GraphConfigBuilder {
    config: GraphConfig,
}

impl GraphConfigBuilder {
    /// Set the execution policy
    pub fn execution(mut self, execution: ExecutionPolicy) -> Self {
        self.config.execution = execution;
        self
    }

    /// Set the parallel threshold in elements
    pub fn parallel_min_len(mut self, len: usize) -> Self {
        self.config.parallel_min_len = len;
        self
    }

    /// Enable or disable the shape cache
    pub fn shape_cache(mut self, enabled: bool) -> Self {
        self.config.shape_cache = enabled;
        self
    }

    /// Finish the configuration
    pub fn build(self) -> GraphConfig {
        self.config
    }
}
