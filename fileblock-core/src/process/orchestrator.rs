// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Process orchestrator for one shared-memory transfer session.
//!
//! The parent creates the region, forks the writer and the reader, then
//! supervises both. If one side fails while the other is still running,
//! the survivor is terminated: a reader waiting for a frame that will
//! never come (or a writer waiting for a drained block) would otherwise
//! block forever. Both children are always reaped and the region is
//! destroyed exactly once before returning.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{ProcessError, RoleError, TransferError};
use crate::process::{ChildProcess, ExitKind, ForkSpawner, Spawner};
use crate::shm::SharedRegion;
use crate::transfer::{consume_file, produce_file, TransferStats};
use crate::types::{BlockSize, ProcessRole, SessionName};

/// Delay between supervision polls of the two children.
const SUPERVISE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Facts about a finished, successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub session: SessionName,
    pub writer_pid: i32,
    pub reader_pid: i32,
}

/// Runs writer/reader sessions over freshly named shared regions.
pub struct Orchestrator<S: Spawner = ForkSpawner> {
    block_size: BlockSize,
    session_prefix: SessionName,
    spawner: S,
}

impl Orchestrator<ForkSpawner> {
    /// Create an orchestrator using the configured block size and prefix.
    pub fn new(config: &Config) -> Self {
        Self::with_spawner(config, ForkSpawner)
    }
}

impl<S: Spawner> Orchestrator<S> {
    /// Create an orchestrator that starts its roles through `spawner`.
    pub fn with_spawner(config: &Config, spawner: S) -> Self {
        Self {
            block_size: config.block_size,
            session_prefix: config.session_prefix.clone(),
            spawner,
        }
    }

    /// Block size every session of this orchestrator uses.
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// Copy `src` to `dst` through a new uniquely named session.
    pub fn transfer(&self, src: &Path, dst: &Path) -> Result<TransferReport, TransferError> {
        let session = SessionName::unique(&self.session_prefix);
        self.transfer_in(&session, src, dst)
    }

    /// Copy `src` to `dst` through a session with the given name.
    ///
    /// The caller is responsible for the name not being used by any other
    /// live session.
    pub fn transfer_in(
        &self,
        session: &SessionName,
        src: &Path,
        dst: &Path,
    ) -> Result<TransferReport, TransferError> {
        let started = Instant::now();

        let mut region =
            SharedRegion::init(session.as_str(), self.block_size.bytes()).map_err(|e| {
                tracing::error!(session = %session, error = %e, "Region init failed");
                TransferError::RegionInit(e)
            })?;

        let result = self.run_session(&region, src, dst);
        region.destroy();

        match &result {
            Ok(report) => tracing::info!(
                session = %session,
                src = %src.display(),
                dst = %dst.display(),
                writer_pid = report.writer_pid,
                reader_pid = report.reader_pid,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Transfer complete"
            ),
            Err(e) => tracing::error!(
                session = %session,
                src = %src.display(),
                dst = %dst.display(),
                error = %e,
                "Transfer failed"
            ),
        }

        result
    }

    fn run_session(
        &self,
        region: &SharedRegion,
        src: &Path,
        dst: &Path,
    ) -> Result<TransferReport, TransferError> {
        let mut writer = self
            .spawner
            .spawn(ProcessRole::Writer.as_str(), || {
                role_exit(ProcessRole::Writer, produce_file(region, src))
            })
            .map_err(TransferError::WriterSpawn)?;

        let mut reader = match self.spawner.spawn(ProcessRole::Reader.as_str(), || {
            role_exit(ProcessRole::Reader, consume_file(region, dst))
        }) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::error!(
                    writer_pid = writer.pid(),
                    error = %e,
                    "Reader spawn failed, terminating writer"
                );
                if let Err(kill_err) = writer.terminate() {
                    tracing::error!(error = %kill_err, "Failed to terminate writer");
                }
                if let Err(wait_err) = writer.wait() {
                    tracing::error!(error = %wait_err, "Failed to reap writer");
                }
                return Err(TransferError::ReaderSpawn(e));
            }
        };

        let report = TransferReport {
            session: region.name().clone(),
            writer_pid: writer.pid(),
            reader_pid: reader.pid(),
        };

        supervise(&mut writer, &mut reader).map(|()| report)
    }
}

/// Exit code for a role process, logging how it went.
fn role_exit(role: ProcessRole, result: Result<TransferStats, RoleError>) -> i32 {
    match result {
        Ok(stats) => {
            tracing::info!(
                role = %role,
                pid = std::process::id(),
                frames = stats.frames,
                bytes = stats.bytes,
                "Role finished"
            );
            0
        }
        // Already logged where it was detected.
        Err(e) => e.exit_code(),
    }
}

/// One supervised child and what became of it.
struct Watched<'a> {
    role: ProcessRole,
    child: &'a mut ChildProcess,
    outcome: Option<Result<ExitKind, ProcessError>>,
    terminated: bool,
}

impl<'a> Watched<'a> {
    fn new(role: ProcessRole, child: &'a mut ChildProcess) -> Self {
        Self {
            role,
            child,
            outcome: None,
            terminated: false,
        }
    }

    fn poll(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        match self.child.try_wait() {
            Ok(Some(exit)) => self.outcome = Some(Ok(exit)),
            Ok(None) => {}
            Err(e) => self.outcome = Some(Err(e)),
        }
    }

    fn failure(&self) -> Option<TransferError> {
        let pid = self.child.pid();
        match self.outcome.as_ref()? {
            Ok(ExitKind::Exited(0)) => None,
            Ok(ExitKind::Exited(code)) => Some(TransferError::RoleFailed {
                role: self.role,
                pid,
                code: *code,
            }),
            Ok(ExitKind::Signaled(signal)) => Some(TransferError::AbnormalExit {
                role: self.role,
                pid,
                signal: *signal,
            }),
            Err(e) => Some(match self.role {
                ProcessRole::Writer => TransferError::WriterWait(e.clone()),
                _ => TransferError::ReaderWait(e.clone()),
            }),
        }
    }

    fn stop(&mut self) {
        if self.outcome.is_some() || self.terminated {
            return;
        }
        tracing::warn!(role = %self.role, pid = self.child.pid(), "Terminating sibling");
        if let Err(e) = self.child.terminate() {
            tracing::error!(role = %self.role, error = %e, "Failed to terminate sibling");
        }
        self.terminated = true;
    }
}

/// Wait for both roles. The first failure observed wins; a sibling we
/// terminated because of it is not reported.
fn supervise(writer: &mut ChildProcess, reader: &mut ChildProcess) -> Result<(), TransferError> {
    let mut writer = Watched::new(ProcessRole::Writer, writer);
    let mut reader = Watched::new(ProcessRole::Reader, reader);
    let mut first_failure: Option<TransferError> = None;

    loop {
        writer.poll();
        reader.poll();

        if first_failure.is_none() {
            if let Some(err) = writer.failure().filter(|_| !writer.terminated) {
                first_failure = Some(err);
                reader.stop();
            } else if let Some(err) = reader.failure().filter(|_| !reader.terminated) {
                first_failure = Some(err);
                writer.stop();
            }
        }

        if writer.outcome.is_some() && reader.outcome.is_some() {
            break;
        }
        std::thread::sleep(SUPERVISE_POLL_INTERVAL);
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use tempfile::TempDir;

    /// Forks normally except for the labels it is told to refuse.
    struct Refusing {
        refuse: &'static str,
        spawned: RefCell<Vec<&'static str>>,
    }

    impl Refusing {
        fn new(refuse: &'static str) -> Self {
            Self {
                refuse,
                spawned: RefCell::new(Vec::new()),
            }
        }
    }

    impl Spawner for Refusing {
        fn spawn<F>(&self, label: &'static str, task: F) -> Result<ChildProcess, ProcessError>
        where
            F: FnOnce() -> i32,
        {
            if label == self.refuse {
                return Err(ProcessError::ForkFailed {
                    reason: "refused by test spawner".to_string(),
                });
            }
            self.spawned.borrow_mut().push(label);
            ChildProcess::spawn(label, task)
        }
    }

    /// Forks normally, but the writer kills itself before doing any work.
    struct KillWriter;

    impl Spawner for KillWriter {
        fn spawn<F>(&self, label: &'static str, task: F) -> Result<ChildProcess, ProcessError>
        where
            F: FnOnce() -> i32,
        {
            if label == ProcessRole::Writer.as_str() {
                return ChildProcess::spawn(label, || {
                    let _ = nix::sys::signal::raise(nix::sys::signal::Signal::SIGKILL);
                    0
                });
            }
            ChildProcess::spawn(label, task)
        }
    }

    fn leaked(name: &SessionName) -> bool {
        let shm = std::path::Path::new("/dev/shm");
        [
            shm.join(name.as_str()),
            shm.join(format!("sem.{}.empty", name)),
            shm.join(format!("sem.{}.full", name)),
        ]
        .iter()
        .any(|p| p.exists())
    }

    fn small_config() -> Config {
        Config {
            block_size: BlockSize::new(64).unwrap(),
            ..Config::default()
        }
    }

    fn session(tag: &str) -> SessionName {
        SessionName::new(format!("fileblock-orchtest-{}-{}", tag, std::process::id())).unwrap()
    }

    #[test]
    fn test_writer_spawn_failure_spawns_no_reader() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::write(&src, b"payload").unwrap();

        let orchestrator = Orchestrator::with_spawner(&small_config(), Refusing::new("writer"));
        let name = session("nowriter");
        let err = orchestrator
            .transfer_in(&name, &src, &dir.path().join("dst"))
            .unwrap_err();

        assert!(matches!(err, TransferError::WriterSpawn(_)));
        assert!(orchestrator.spawner.spawned.borrow().is_empty());
        assert!(SharedRegion::init(name.as_str(), 64).is_ok());
    }

    #[test]
    fn test_reader_spawn_failure_terminates_writer() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        // Far more than one block, so the writer is parked on `empty`.
        std::fs::write(&src, vec![0x5Au8; 64 * 50]).unwrap();

        let orchestrator = Orchestrator::with_spawner(&small_config(), Refusing::new("reader"));
        let name = session("noreader");
        let err = orchestrator
            .transfer_in(&name, &src, &dir.path().join("dst"))
            .unwrap_err();

        assert!(matches!(err, TransferError::ReaderSpawn(_)));
        assert_eq!(*orchestrator.spawner.spawned.borrow(), vec!["writer"]);

        let region = SharedRegion::init(name.as_str(), 64).unwrap();
        assert_eq!(region.semaphore_values().unwrap(), (1, 0));
    }

    #[test]
    fn test_signaled_writer_is_abnormal_exit() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::write(&src, b"never sent").unwrap();

        let orchestrator = Orchestrator::with_spawner(&small_config(), KillWriter);
        let name = session("killed");
        let err = orchestrator
            .transfer_in(&name, &src, &dir.path().join("dst"))
            .unwrap_err();

        // The reader parked on `full` is terminated, but the writer's
        // signal is what gets reported.
        assert!(matches!(
            err,
            TransferError::AbnormalExit {
                role: ProcessRole::Writer,
                signal,
                ..
            } if signal == nix::sys::signal::Signal::SIGKILL as i32
        ));
        assert!(!leaked(&name));
    }

    #[test]
    fn test_successful_transfer_reports_session() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::write(&src, b"hello through shared memory").unwrap();

        let orchestrator = Orchestrator::new(&small_config());
        let name = session("report");
        let report = orchestrator.transfer_in(&name, &src, &dst).unwrap();

        assert_eq!(report.session, name);
        assert_ne!(report.writer_pid, report.reader_pid);
        assert_eq!(std::fs::read(&dst).unwrap(), b"hello through shared memory");
    }

    #[test]
    fn test_role_exit_codes() {
        assert_eq!(role_exit(ProcessRole::Writer, Ok(TransferStats::default())), 0);
        let err = RoleError::CorruptFrame { length: 1, max: 0 };
        assert_eq!(role_exit(ProcessRole::Reader, Err(err)), 3);
    }
}
