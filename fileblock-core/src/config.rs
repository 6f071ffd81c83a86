// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Supplies the shared-region block size, the log file path and the
//! prefix used to name transfer sessions. A session snapshots the values
//! it starts with, so swapping the configuration only affects sessions
//! started afterwards.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{FileBlockError, FileBlockResult, HardValidationError};
use crate::types::{BlockSize, SessionName};

/// Raw configuration as parsed from YAML (before validation).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    /// Signed so that `0` and negative values can fall back to the default.
    #[serde(default)]
    block_size: Option<i64>,
    #[serde(default)]
    log_path: Option<String>,
    #[serde(default)]
    session_prefix: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Capacity of each session's shared region.
    pub block_size: BlockSize,
    /// Log file; `None` logs to stderr.
    pub log_path: Option<PathBuf>,
    /// Prefix for generated session names.
    pub session_prefix: SessionName,
}

impl Config {
    /// Same configuration with a different block size.
    ///
    /// Unset or non-positive values fall back to the default block size.
    pub fn with_block_size(mut self, raw: Option<i64>) -> FileBlockResult<Self> {
        self.block_size = BlockSize::from_configured(raw)?;
        Ok(self)
    }

    /// Same configuration with a different log file.
    pub fn with_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.log_path = path;
        self
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> FileBlockResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(FileBlockError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FileBlockError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn load_string(content: &str) -> FileBlockResult<Config> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| FileBlockError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::validate(raw)
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> FileBlockResult<Config> {
        let block_size = BlockSize::from_configured(raw.block_size)?;

        let log_path = match raw.log_path {
            Some(path) if path.trim().is_empty() => {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "log_path",
                    value: path,
                    reason: "Log path cannot be blank".to_string(),
                }
                .into());
            }
            Some(path) => Some(PathBuf::from(path)),
            None => None,
        };

        let session_prefix = match raw.session_prefix {
            Some(prefix) => SessionName::new(prefix)?,
            None => SessionName::default(),
        };

        Ok(Config {
            block_size,
            log_path,
            session_prefix,
        })
    }
}
