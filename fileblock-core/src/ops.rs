// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! File operations exposed to callers.
//!
//! `copy`, `move_file` and `delete` return a bare [`StatusCode`]; the
//! reason for a failure is only ever written to the log. The `*_isolated`
//! variants run the same operation inside a throwaway child process so a
//! crash in the transfer machinery can't take the caller down with it.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::config::Config;
use crate::error::{FileBlockError, FileBlockResult, HardValidationError};
use crate::process::{Orchestrator, TransferReport};
use crate::task::run_in_process;
use crate::types::StatusCode;

/// Entry point for copy / move / delete.
#[derive(Debug, Clone, Default)]
pub struct FileOps {
    config: Config,
}

impl FileOps {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Configuration used by the next operation.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration. Sessions already running keep theirs.
    pub fn reconfigure(&mut self, config: Config) {
        tracing::info!(
            block_size = config.block_size.bytes(),
            session_prefix = %config.session_prefix,
            "Configuration updated"
        );
        self.config = config;
    }

    /// Byte-exact copy through the shared-memory transfer protocol.
    pub fn copy(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> StatusCode {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        match self.try_copy(src, dst) {
            Ok(_) => {
                tracing::info!(src = %src.display(), dst = %dst.display(), "File copied");
                StatusCode::Success
            }
            Err(e) => {
                tracing::error!(src = %src.display(), dst = %dst.display(), error = %e, "Copy failed");
                StatusCode::Failure
            }
        }
    }

    /// Copy, then delete the source. The source is left untouched if the
    /// copy fails.
    pub fn move_file(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> StatusCode {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        if !self.copy(src, dst).is_success() {
            tracing::error!(src = %src.display(), dst = %dst.display(), "Move aborted, source kept");
            return StatusCode::Failure;
        }

        match remove(src) {
            Ok(()) => {
                tracing::info!(src = %src.display(), dst = %dst.display(), "File moved");
                StatusCode::Success
            }
            Err(e) => {
                tracing::error!(src = %src.display(), error = %e, "Failed to delete source after copy");
                StatusCode::Failure
            }
        }
    }

    /// Remove a single file.
    pub fn delete(&self, path: impl AsRef<Path>) -> StatusCode {
        let path = path.as_ref();
        match remove(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "File deleted");
                StatusCode::Success
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Delete failed");
                StatusCode::Failure
            }
        }
    }

    /// [`FileOps::copy`] in an isolated child process.
    pub fn copy_isolated(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> StatusCode {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        tracing::debug!(src = %src.display(), dst = %dst.display(), "Isolated copy");
        run_in_process(|| self.copy(src, dst).exit_code()).status()
    }

    /// [`FileOps::move_file`] in an isolated child process.
    pub fn move_isolated(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> StatusCode {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        tracing::debug!(src = %src.display(), dst = %dst.display(), "Isolated move");
        run_in_process(|| self.move_file(src, dst).exit_code()).status()
    }

    /// [`FileOps::delete`] in an isolated child process.
    pub fn delete_isolated(&self, path: impl AsRef<Path>) -> StatusCode {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Isolated delete");
        run_in_process(|| self.delete(path).exit_code()).status()
    }

    /// Copy with the failure reason kept.
    pub fn try_copy(&self, src: &Path, dst: &Path) -> FileBlockResult<TransferReport> {
        require_path(src, "source")?;
        require_path(dst, "destination")?;

        // The reader truncates the destination before the writer reads it.
        if let (Ok(a), Ok(b)) = (std::fs::metadata(src), std::fs::metadata(dst)) {
            if a.dev() == b.dev() && a.ino() == b.ino() {
                return Err(HardValidationError::SameFile {
                    path: src.to_path_buf(),
                }
                .into());
            }
        }

        Ok(Orchestrator::new(&self.config).transfer(src, dst)?)
    }
}

fn require_path(path: &Path, argument: &'static str) -> Result<(), HardValidationError> {
    if path.as_os_str().is_empty() {
        return Err(HardValidationError::EmptyPath { argument });
    }
    Ok(())
}

fn remove(path: &Path) -> FileBlockResult<()> {
    require_path(path, "path")?;
    std::fs::remove_file(path).map_err(|e| FileBlockError::Io {
        context: "removing file",
        source: e,
    })
}
