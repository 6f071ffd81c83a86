// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

use fileblock_core::StatusCode;
use thiserror::Error;

pub mod delete;
pub mod transfer;
pub mod validate;

/// Failures reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{operation} failed with status {status} (see log for details)")]
    OperationFailed {
        operation: &'static str,
        status: StatusCode,
    },

    #[error(transparent)]
    Core(#[from] fileblock_core::FileBlockError),
}

/// Turn a file operation status into a command result.
pub fn check(operation: &'static str, status: StatusCode) -> Result<(), CliError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(CliError::OperationFailed { operation, status })
    }
}
