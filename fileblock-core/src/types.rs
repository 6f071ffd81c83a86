// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;
use crate::transfer::HEADER_SIZE;

/// Block size used when none is configured.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;
/// Largest accepted block size: 64 MB
const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;
/// Longest accepted session name. Semaphore names get a suffix and the
/// kernel prefixes them with `sem.`, so stay well under NAME_MAX.
const MAX_SESSION_NAME_LEN: usize = 200;

/// Per-process counter used to derive unique session names.
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Validated name of a shared-memory session.
/// Must be non-empty, ASCII alphanumeric with `-`, `_` or `.`, max 200 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionName(String);

impl SessionName {
    /// Create a new SessionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(HardValidationError::InvalidSessionName {
                name,
                reason: "Session name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_SESSION_NAME_LEN {
            return Err(HardValidationError::InvalidSessionName {
                reason: format!(
                    "Session name too long: {} chars (max {})",
                    name.len(),
                    MAX_SESSION_NAME_LEN
                ),
                name,
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(HardValidationError::InvalidSessionName {
                name,
                reason: "Session name must contain only ASCII alphanumerics, '-', '_' and '.'"
                    .to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Derive a name no other session in this process (or any other live
    /// process) is using: `<prefix>-<pid>-<counter>`.
    pub fn unique(prefix: &SessionName) -> Self {
        let seq = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = format!("{}-{}-{}", prefix.0, std::process::id(), seq);
        // The suffix is at most ~31 chars; trim the prefix side if needed.
        if name.len() > MAX_SESSION_NAME_LEN {
            name = name.split_off(name.len() - MAX_SESSION_NAME_LEN);
            name = name.trim_start_matches(['-', '.']).to_string();
        }
        Self(name)
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the shared memory object (`/<name>`).
    pub fn shm_path(&self) -> String {
        format!("/{}", self.0)
    }

    /// Name of the "buffer available" semaphore.
    pub fn empty_sem_path(&self) -> String {
        format!("/{}.empty", self.0)
    }

    /// Name of the "buffer holds data" semaphore.
    pub fn full_sem_path(&self) -> String {
        format!("/{}.full", self.0)
    }
}

impl Default for SessionName {
    fn default() -> Self {
        Self("fileblock".to_string())
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SessionName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionName> for String {
    fn from(name: SessionName) -> Self {
        name.0
    }
}

/// Validated shared-region block size in bytes.
/// Must leave room for at least one payload byte after the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct BlockSize(usize);

impl BlockSize {
    /// Smallest usable block: header plus one payload byte.
    pub const MIN: usize = HEADER_SIZE + 1;

    /// Create a new BlockSize with bounds validation.
    pub fn new(bytes: usize) -> Result<Self, HardValidationError> {
        if !(Self::MIN..=MAX_BLOCK_SIZE).contains(&bytes) {
            return Err(HardValidationError::BlockSizeOutOfBounds {
                size: bytes,
                min: Self::MIN,
                max: MAX_BLOCK_SIZE,
            });
        }
        Ok(Self(bytes))
    }

    /// Interpret a raw configured value: unset or non-positive falls back
    /// to [`DEFAULT_BLOCK_SIZE`].
    pub fn from_configured(raw: Option<i64>) -> Result<Self, HardValidationError> {
        match raw {
            Some(v) if v > 0 => {
                let bytes = usize::try_from(v).map_err(|_| {
                    HardValidationError::BlockSizeOutOfBounds {
                        size: usize::MAX,
                        min: Self::MIN,
                        max: MAX_BLOCK_SIZE,
                    }
                })?;
                Self::new(bytes)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Get the block size in bytes.
    pub fn bytes(&self) -> usize {
        self.0
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self(DEFAULT_BLOCK_SIZE)
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

impl TryFrom<usize> for BlockSize {
    type Error = HardValidationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BlockSize> for usize {
    fn from(size: BlockSize) -> Self {
        size.0
    }
}

/// Role a process plays in a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// Reads the source and emits frames.
    Writer,
    /// Drains frames and rebuilds the destination.
    Reader,
    /// Owns the region, spawns and reaps both roles.
    Parent,
}

impl ProcessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessRole::Writer => "writer",
            ProcessRole::Reader => "reader",
            ProcessRole::Parent => "parent",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a file operation at the API boundary.
///
/// Reasons are only observable through the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Success = 0,
    Failure = -1,
}

impl StatusCode {
    /// Numeric value (0 or -1).
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }

    /// Low 8 bits as carried through a process exit code (0 or 255).
    pub fn exit_code(self) -> i32 {
        self.code() & 0xFF
    }

    /// Rebuild from a child's exit code: only 0 means success.
    pub fn from_exit_code(code: u8) -> Self {
        if code == 0 {
            StatusCode::Success
        } else {
            StatusCode::Failure
        }
    }
}

impl<E> From<Result<(), E>> for StatusCode {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => StatusCode::Success,
            Err(_) => StatusCode::Failure,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Success => write!(f, "success (0)"),
            StatusCode::Failure => write!(f, "failure (-1)"),
        }
    }
}
