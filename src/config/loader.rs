// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_CORE_POOL_SIZE, DEFAULT_KEEP_ALIVE_MS, DEFAULT_MAX_POOL_SIZE, DEFAULT_QUEUE_CAPACITY,
};
use crate::errors::{ConfigError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the chain runtime.
///
/// Loaded from a YAML or TOML file. Every section is optional and falls back to the
/// built-in defaults.
///
/// # Fields
/// * `dispatcher` - Worker pool sizing and overflow behaviour
///
/// # Example
/// ```yaml
/// dispatcher:
///   core_pool_size: 2
///   max_pool_size: 4
///   keep_alive_ms: 20000
///   queue_capacity: 256
///   overflow_policy: abort
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

/// Worker pool configuration consumed when the dispatcher is constructed.
///
/// # Fields
/// * `core_pool_size` - Workers kept alive even when idle (>= 1)
/// * `max_pool_size` - Upper bound on workers, reached only when the queue is full (>= core)
/// * `keep_alive_ms` - Idle time before a worker above the core size retires
/// * `queue_capacity` - Entry tasks that may wait for a worker; `0` hands tasks directly to
///   an idle worker and never queues
/// * `overflow_policy` - What happens when the queue is full and the pool is at max size
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DispatcherConfig {
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    pub keep_alive_ms: u64,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            core_pool_size: DEFAULT_CORE_POOL_SIZE,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            keep_alive_ms: DEFAULT_KEEP_ALIVE_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// Check the pool bounds, collecting every violation.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.core_pool_size < 1 {
            errors.push(ValidationError::CorePoolTooSmall {
                core_pool_size: self.core_pool_size,
            });
        }
        if self.max_pool_size < self.core_pool_size {
            errors.push(ValidationError::MaxBelowCore {
                core_pool_size: self.core_pool_size,
                max_pool_size: self.max_pool_size,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Behaviour when an entry task arrives at a saturated pool.
///
/// # Variants
/// * `Abort` - Refuse the task; `execute()` returns `ChainError::WorkerRejected`
/// * `CallerRuns` - Run the whole chain on the thread that called `execute()`
/// * `Discard` - Drop the task; its chain settles rejected with `WorkerRejected`
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    Abort,
    CallerRuns,
    Discard,
}

/// Load a config from a YAML (`.yaml`/`.yml`) or TOML (`.toml`) file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let cfg = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(cfg)
}

/// Load and validate a config file
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    cfg.dispatcher.validate().map_err(ConfigError::Invalid)?;
    Ok(cfg)
}
