// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Forked child process handles.
//!
//! A child runs one closure in its own address space and reports back
//! only through its exit status. Panics inside the closure are caught in
//! the child and turned into [`PANIC_EXIT_CODE`]; the child then leaves
//! with `_exit`, so no destructor, atexit hook or shared stdio buffer of
//! the parent runs a second time.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::error::ProcessError;

/// Exit code of a child whose closure panicked.
pub const PANIC_EXIT_CODE: i32 = 101;

/// How a reaped child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Normal exit with the given code (0-255).
    Exited(i32),
    /// Killed by the given signal number.
    Signaled(i32),
}

impl ExitKind {
    pub fn success(&self) -> bool {
        matches!(self, ExitKind::Exited(0))
    }
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Exited(code) => write!(f, "exited with code {}", code),
            ExitKind::Signaled(sig) => write!(f, "killed by signal {}", sig),
        }
    }
}

/// Something that can start a closure in an isolated child process.
pub trait Spawner {
    /// Start `task` in a new process labelled `label`.
    fn spawn<F>(&self, label: &'static str, task: F) -> Result<ChildProcess, ProcessError>
    where
        F: FnOnce() -> i32;
}

/// Spawns children with `fork`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForkSpawner;

impl Spawner for ForkSpawner {
    fn spawn<F>(&self, label: &'static str, task: F) -> Result<ChildProcess, ProcessError>
    where
        F: FnOnce() -> i32,
    {
        ChildProcess::spawn(label, task)
    }
}

/// Handle to a forked child.
///
/// Dropping a handle whose child was never reaped kills and reaps it, so a
/// handle can't leave a zombie behind.
pub struct ChildProcess {
    /// Label for logs ("writer", "reader", "task").
    label: &'static str,
    /// Process ID.
    pid: Pid,
    /// Set once the child has been reaped.
    exit: Option<ExitKind>,
}

impl ChildProcess {
    /// Fork and run `task` in the child.
    ///
    /// The child exits with the low 8 bits of the closure's return value.
    ///
    /// # Errors
    /// Returns ProcessError::ForkFailed if the process can't be created.
    pub fn spawn<F>(label: &'static str, task: F) -> Result<Self, ProcessError>
    where
        F: FnOnce() -> i32,
    {
        // SAFETY: the child only runs `task` and then leaves through
        // `_exit`; it never returns into the caller's stack.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                tracing::debug!(label = label, pid = child.as_raw(), "Spawned child process");
                Ok(Self {
                    label,
                    pid: child,
                    exit: None,
                })
            }
            Ok(ForkResult::Child) => {
                let code = match panic::catch_unwind(AssertUnwindSafe(task)) {
                    Ok(code) => code & 0xFF,
                    Err(payload) => {
                        tracing::error!(
                            label = label,
                            pid = std::process::id(),
                            panic = %panic_message(payload.as_ref()),
                            "Child process panicked"
                        );
                        PANIC_EXIT_CODE
                    }
                };
                // SAFETY: terminates this process immediately, skipping
                // atexit handlers and stdio flushing inherited from the parent.
                unsafe { libc::_exit(code) }
            }
            Err(errno) => {
                tracing::error!(label = label, error = %errno, "fork failed");
                Err(ProcessError::ForkFailed {
                    reason: errno.to_string(),
                })
            }
        }
    }

    /// Get the process ID.
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// Get the label.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Exit classification, if already reaped.
    pub fn exit_kind(&self) -> Option<ExitKind> {
        self.exit
    }

    /// Block until the child exits.
    pub fn wait(&mut self) -> Result<ExitKind, ProcessError> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        loop {
            match self.reap(None)? {
                Some(exit) => return Ok(exit),
                None => continue,
            }
        }
    }

    /// Reap the child if it has already exited.
    pub fn try_wait(&mut self) -> Result<Option<ExitKind>, ProcessError> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }
        self.reap(Some(WaitPidFlag::WNOHANG))
    }

    /// Ask the child to stop with SIGTERM. No-op once reaped.
    pub fn terminate(&self) -> Result<(), ProcessError> {
        self.signal(Signal::SIGTERM)
    }

    fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        if self.exit.is_some() {
            return Ok(());
        }
        match kill(self.pid, signal) {
            Ok(()) | Err(Errno::ESRCH) => {
                tracing::debug!(label = self.label, pid = self.pid(), signal = ?signal, "Signalled child");
                Ok(())
            }
            Err(errno) => Err(ProcessError::SignalFailed {
                pid: self.pid(),
                reason: errno.to_string(),
            }),
        }
    }

    fn reap(&mut self, flags: Option<WaitPidFlag>) -> Result<Option<ExitKind>, ProcessError> {
        let status = loop {
            match waitpid(self.pid, flags) {
                Ok(status) => break status,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    return Err(ProcessError::WaitFailed {
                        pid: self.pid(),
                        reason: errno.to_string(),
                    })
                }
            }
        };

        let exit = match status {
            WaitStatus::Exited(_, code) => ExitKind::Exited(code),
            WaitStatus::Signaled(_, signal, _) => ExitKind::Signaled(signal as i32),
            // Stopped/continued children are still running as far as we care.
            _ => return Ok(None),
        };

        tracing::debug!(label = self.label, pid = self.pid(), exit = %exit, "Reaped child process");
        self.exit = Some(exit);
        Ok(Some(exit))
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.exit.is_none() {
            tracing::warn!(label = self.label, pid = self.pid(), "Killing unreaped child");
            let _ = self.signal(Signal::SIGKILL);
            let _ = self.wait();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
