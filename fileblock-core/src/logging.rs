// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Log sink setup.
//!
//! Installs a global `tracing` subscriber. Forked writer, reader and task
//! children inherit it, so they can log straight away without any setup
//! of their own. The log file is opened in append mode and written without
//! a user-space buffer: lines from several processes interleave whole, and
//! a child leaving through `_exit` loses nothing.
//!
//! The file writer takes no lock. A fork that happens while another thread
//! is mid-event must not leave the child waiting on a mutex it can never
//! acquire; each event is a single `write_all` on an `O_APPEND` descriptor.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::error::{FileBlockError, FileBlockResult};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `verbose`. Logs go to `log_path` when
/// given, stderr otherwise. Returns `Ok(false)` if a subscriber was already
/// installed (the existing one stays in place).
pub fn init(log_path: Option<&Path>, verbose: bool) -> FileBlockResult<bool> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = match log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| FileBlockError::Io {
                    context: "opening log file",
                    source: e,
                })?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::debug!(
            log_path = ?log_path.map(|p| p.display().to_string()),
            "Logging initialized"
        );
    }

    Ok(installed)
}
