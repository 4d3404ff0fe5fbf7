// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while validating a dispatcher configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The core pool must hold at least one worker
    #[error("core_pool_size must be at least 1, got {core_pool_size}")]
    CorePoolTooSmall {
        core_pool_size: usize,
    },
    /// The max pool size may not be smaller than the core size
    #[error("max_pool_size ({max_pool_size}) must be >= core_pool_size ({core_pool_size})")]
    MaxBelowCore {
        core_pool_size: usize,
        max_pool_size: usize,
    },
}

/// Errors that can occur while loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for the config schema
    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The file is not valid TOML for the config schema
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file parsed but failed validation
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
