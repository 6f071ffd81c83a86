// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for FileBlock.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.
//! Nothing in here ever crosses a fork boundary: child processes convert
//! their errors into exit codes, and the parent rebuilds a classification
//! from the wait status.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProcessRole;

/// Top-level error type for FileBlock.
#[derive(Debug, Error)]
pub enum FileBlockError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Transfer Errors
    // =========================================================================
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Validation errors for configuration and caller-supplied arguments.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Block size out of bounds: {size} bytes (min: {min}, max: {max})")]
    BlockSizeOutOfBounds { size: usize, min: usize, max: usize },

    #[error("Invalid session name '{name}': {reason}")]
    InvalidSessionName { name: String, reason: String },

    #[error("Empty path supplied for {argument}")]
    EmptyPath { argument: &'static str },

    #[error("Source and destination are the same file: {path}")]
    SameFile { path: PathBuf },
}

/// Shared region and semaphore errors.
///
/// `InitFailed`, `MapFailed` and `SemaphoreFailed` are initialization
/// failures and are fatal to the whole session. `Sync` is a wait/post
/// failure on an already initialized semaphore pair.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("Failed to create shared memory region: {name} - {reason}")]
    InitFailed { name: String, reason: String },

    #[error("Failed to map shared memory: {reason}")]
    MapFailed { reason: String },

    #[error("Failed to create semaphore {name}: {reason}")]
    SemaphoreFailed { name: String, reason: String },

    #[error("Shared region {name} is not initialized")]
    NotInitialized { name: String },

    #[error("Semaphore {operation} failed on {name}: {reason}")]
    Sync {
        operation: &'static str,
        name: String,
        reason: String,
    },
}

/// Errors raised inside a writer or reader role process.
#[derive(Debug, Error)]
pub enum RoleError {
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error("Corrupt frame: header announces {length} bytes, at most {max} fit")]
    CorruptFrame { length: u64, max: usize },

    #[error("Short transfer through region: {actual} of {expected} bytes")]
    ShortTransfer { expected: usize, actual: usize },

    #[error("Region of {capacity} bytes leaves no room for payload after the frame header")]
    NoPayloadRoom { capacity: usize },
}

impl RoleError {
    /// Exit code used by a role process that stopped on this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RoleError::Io { .. } => 1,
            RoleError::Region(_) | RoleError::NoPayloadRoom { .. } => 2,
            RoleError::CorruptFrame { .. } | RoleError::ShortTransfer { .. } => 3,
        }
    }
}

/// Process spawn and supervision errors.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    #[error("fork failed: {reason}")]
    ForkFailed { reason: String },

    #[error("waitpid failed for pid {pid}: {reason}")]
    WaitFailed { pid: i32, reason: String },

    #[error("Failed to signal pid {pid}: {reason}")]
    SignalFailed { pid: i32, reason: String },
}

/// Transfer failures, tagged with the orchestration stage that failed.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Region init failed: {0}")]
    RegionInit(#[source] RegionError),

    #[error("Writer spawn failed: {0}")]
    WriterSpawn(#[source] ProcessError),

    #[error("Reader spawn failed: {0}")]
    ReaderSpawn(#[source] ProcessError),

    #[error("Writer wait failed: {0}")]
    WriterWait(#[source] ProcessError),

    #[error("Reader wait failed: {0}")]
    ReaderWait(#[source] ProcessError),

    #[error("{role} (pid {pid}) terminated abnormally by signal {signal}")]
    AbnormalExit {
        role: ProcessRole,
        pid: i32,
        signal: i32,
    },

    #[error("{role} (pid {pid}) exited with code {code}")]
    RoleFailed {
        role: ProcessRole,
        pid: i32,
        code: i32,
    },
}

/// Isolated task failures.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Failed to spawn task process: {0}")]
    SpawnFailed(#[source] ProcessError),

    #[error("Task killed by signal {signal}")]
    Signaled { signal: i32 },

    #[error("Task returned failure code {code}")]
    Failed { code: u8 },
}

/// Result type alias using FileBlockError.
pub type FileBlockResult<T> = Result<T, FileBlockError>;
