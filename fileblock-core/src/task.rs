// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Run a unit of work in a disposable child process.
//!
//! The task's return value travels back as the child's exit code, so only
//! its low 8 bits survive (256 distinct outcomes). Nothing is shared with
//! the parent through memory: whatever the task does to globals, open
//! files or the heap stays in the child.

use crate::error::{ProcessError, TaskError};
use crate::process::{ChildProcess, ExitKind};
use crate::types::StatusCode;

/// What the parent learned about an isolated task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The task returned; this is its value modulo 256.
    Completed(u8),
    /// The child was killed by this signal before returning.
    Signaled(i32),
    /// No child could be started.
    SpawnFailed(ProcessError),
    /// The child was started but could not be reaped.
    WaitFailed(ProcessError),
}

impl TaskOutcome {
    /// Collapse into the API status code.
    pub fn status(&self) -> StatusCode {
        match self {
            TaskOutcome::Completed(code) => StatusCode::from_exit_code(*code),
            _ => StatusCode::Failure,
        }
    }

    /// `Ok` only if the task returned 0.
    pub fn into_result(self) -> Result<(), TaskError> {
        match self {
            TaskOutcome::Completed(0) => Ok(()),
            TaskOutcome::Completed(code) => Err(TaskError::Failed { code }),
            TaskOutcome::Signaled(signal) => Err(TaskError::Signaled { signal }),
            TaskOutcome::SpawnFailed(e) | TaskOutcome::WaitFailed(e) => {
                Err(TaskError::SpawnFailed(e))
            }
        }
    }
}

/// Run `task` in a forked child and wait for it.
///
/// A panic inside the task is caught in the child and reported as a
/// non-zero exit code; it never unwinds into the caller.
pub fn run_in_process<F>(task: F) -> TaskOutcome
where
    F: FnOnce() -> i32,
{
    tracing::debug!("Starting isolated task");

    let mut child = match ChildProcess::spawn("task", task) {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start isolated task");
            return TaskOutcome::SpawnFailed(e);
        }
    };

    let outcome = match child.wait() {
        Ok(ExitKind::Exited(code)) => TaskOutcome::Completed((code & 0xFF) as u8),
        Ok(ExitKind::Signaled(signal)) => {
            tracing::error!(pid = child.pid(), signal = signal, "Isolated task killed by signal");
            TaskOutcome::Signaled(signal)
        }
        Err(e) => {
            tracing::error!(pid = child.pid(), error = %e, "Failed to reap isolated task");
            TaskOutcome::WaitFailed(e)
        }
    };

    tracing::debug!(pid = child.pid(), outcome = ?outcome, "Isolated task finished");
    outcome
}
