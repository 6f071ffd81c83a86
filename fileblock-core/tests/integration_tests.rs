// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for FileBlock.
//!
//! These tests fork real writer/reader processes and move real files
//! through POSIX shared memory.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use fileblock_core::transfer::payload_capacity;
use fileblock_core::{
    run_in_process, Config, ConfigLoader, FileOps, Orchestrator, ProcessRole, SessionName,
    SharedRegion, StatusCode, TransferError,
};

const BLOCK: usize = 256;

fn config() -> Config {
    Config::default().with_block_size(Some(BLOCK as i64)).unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(7919) >> 3) as u8).collect()
}

fn session(tag: &str) -> SessionName {
    SessionName::new(format!("fileblock-it-{}-{}", tag, std::process::id())).unwrap()
}

/// Whether any named object of the session is still present.
fn leaked(name: &SessionName) -> bool {
    let shm = Path::new("/dev/shm");
    [
        shm.join(name.as_str()),
        shm.join(format!("sem.{}.empty", name)),
        shm.join(format!("sem.{}.full", name)),
    ]
    .iter()
    .any(|p| p.exists())
}

fn write_source(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, data).expect("Failed to write source");
    path
}

/// Round trip for sizes around the block and payload boundaries
#[test]
fn test_copy_round_trip_sizes() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let ops = FileOps::new(config());
    let per_frame = payload_capacity(BLOCK);

    let sizes = [
        0,
        1,
        BLOCK - 1,
        BLOCK,
        BLOCK + 1,
        BLOCK * 5 + 17,
        per_frame,
        per_frame * 3,
    ];

    for size in sizes {
        let data = pattern(size);
        let src = write_source(&temp_dir, &format!("src-{}", size), &data);
        let dst = temp_dir.path().join(format!("dst-{}", size));

        assert_eq!(ops.copy(&src, &dst), StatusCode::Success, "size {}", size);
        let copied = std::fs::read(&dst).expect("Destination missing");
        assert_eq!(copied.len(), size, "size {}", size);
        assert!(copied == data, "content mismatch for size {}", size);
    }
}

/// 2500 bytes over a 1024-byte block
#[test]
fn test_copy_2500_bytes_default_block() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let data = pattern(2500);
    let src = write_source(&temp_dir, "src", &data);
    let dst = temp_dir.path().join("dst");

    let ops = FileOps::default();
    assert_eq!(ops.config().block_size.bytes(), 1024);
    assert_eq!(ops.copy(&src, &dst), StatusCode::Success);
    assert_eq!(std::fs::read(&dst).unwrap(), data);
}

/// Copy overwrites an existing, longer destination
#[test]
fn test_copy_truncates_existing_destination() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let src = write_source(&temp_dir, "src", b"short");
    let dst = write_source(&temp_dir, "dst", &pattern(4096));

    assert_eq!(FileOps::new(config()).copy(&src, &dst), StatusCode::Success);
    assert_eq!(std::fs::read(&dst).unwrap(), b"short");
}

/// Unreadable source: the copy fails, nothing hangs, nothing leaks
#[test]
fn test_writer_failure_is_isolated() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let name = session("writerfail");
    let orchestrator = Orchestrator::new(&config());

    let err = orchestrator
        .transfer_in(
            &name,
            &temp_dir.path().join("does-not-exist"),
            &temp_dir.path().join("dst"),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        TransferError::RoleFailed {
            role: ProcessRole::Writer,
            code: 1,
            ..
        }
    ));
    assert!(!leaked(&name));

    // Same name is immediately usable again.
    let region = SharedRegion::init(name.as_str(), BLOCK).expect("Re-init failed");
    assert_eq!(region.semaphore_values().unwrap(), (1, 0));
}

/// Unwritable destination: the blocked writer is terminated
#[test]
fn test_reader_failure_is_isolated() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let src = write_source(&temp_dir, "src", &pattern(BLOCK * 40));
    let name = session("readerfail");
    let orchestrator = Orchestrator::new(&config());

    let err = orchestrator
        .transfer_in(&name, &src, &temp_dir.path().join("missing-dir").join("dst"))
        .unwrap_err();

    assert!(matches!(
        err,
        TransferError::RoleFailed {
            role: ProcessRole::Reader,
            code: 1,
            ..
        }
    ));
    assert!(!leaked(&name));
    assert!(src.exists());
}

/// Successful sessions clean up after themselves
#[test]
fn test_no_leak_after_success() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let src = write_source(&temp_dir, "src", &pattern(1000));
    let name = session("clean");

    Orchestrator::new(&config())
        .transfer_in(&name, &src, &temp_dir.path().join("dst"))
        .expect("Transfer failed");

    assert!(!leaked(&name));
}

/// Destroy twice, then reuse the name
#[test]
fn test_destroy_idempotent() {
    let name = session("destroy");
    let mut region = SharedRegion::init(name.as_str(), BLOCK).expect("Init failed");
    region.destroy();
    region.destroy();
    assert!(!leaked(&name));

    let mut again = SharedRegion::init(name.as_str(), BLOCK).expect("Re-init failed");
    again.destroy();
}

/// Move deletes the source only after a successful copy
#[test]
fn test_move_success() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let data = pattern(777);
    let src = write_source(&temp_dir, "src", &data);
    let dst = temp_dir.path().join("dst");

    assert_eq!(FileOps::new(config()).move_file(&src, &dst), StatusCode::Success);
    assert!(!src.exists());
    assert_eq!(std::fs::read(&dst).unwrap(), data);
}

/// Failed copy leaves the source in place and unmodified
#[test]
fn test_move_failure_keeps_source() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let data = pattern(900);
    let src = write_source(&temp_dir, "src", &data);
    let dst = temp_dir.path().join("no-such-dir").join("dst");

    assert_eq!(FileOps::new(config()).move_file(&src, &dst), StatusCode::Failure);
    assert_eq!(std::fs::read(&src).unwrap(), data);
}

/// Delete removes exactly one file
#[test]
fn test_delete() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let victim = write_source(&temp_dir, "victim", b"bye");
    let bystander = write_source(&temp_dir, "bystander", b"stay");

    let ops = FileOps::new(config());
    assert_eq!(ops.delete(&victim), StatusCode::Success);
    assert!(!victim.exists());
    assert!(bystander.exists());
    assert_eq!(ops.delete(&victim), StatusCode::Failure);
}

/// Isolated variants behave like the direct ones
#[test]
fn test_isolated_operations() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let data = pattern(BLOCK * 3 + 5);
    let src = write_source(&temp_dir, "src", &data);
    let copy = temp_dir.path().join("copy");
    let moved = temp_dir.path().join("moved");
    let ops = FileOps::new(config());

    assert_eq!(ops.copy_isolated(&src, &copy), StatusCode::Success);
    assert_eq!(std::fs::read(&copy).unwrap(), data);

    assert_eq!(ops.move_isolated(&copy, &moved), StatusCode::Success);
    assert!(!copy.exists());
    assert_eq!(std::fs::read(&moved).unwrap(), data);

    assert_eq!(ops.delete_isolated(&moved), StatusCode::Success);
    assert!(!moved.exists());

    assert_eq!(
        ops.copy_isolated(temp_dir.path().join("absent"), &copy),
        StatusCode::Failure
    );
    assert_eq!(
        ops.move_isolated(temp_dir.path().join("absent"), &copy),
        StatusCode::Failure
    );
    assert_eq!(ops.delete_isolated(&moved), StatusCode::Failure);
}

/// A task that panics inside the child leaves the parent untouched
#[test]
fn test_task_isolation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_source(&temp_dir, "parent-owned", b"parent");
    let mut parent_file = std::fs::File::open(&path).expect("Failed to open");
    let mut counter = 10u32;

    let outcome = run_in_process(|| {
        counter += 1;
        panic!("deliberate failure inside isolated task");
    });

    assert_eq!(outcome.status(), StatusCode::Failure);
    assert_eq!(counter, 10);

    use std::io::Read;
    let mut content = String::new();
    parent_file.read_to_string(&mut content).unwrap();
    assert_eq!(content, "parent");
}

/// Configuration file drives the block size of later copies
#[test]
fn test_config_file_block_size() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("fileblock.yaml");
    std::fs::write(&config_path, "block_size: 64\nsession_prefix: it-config\n")
        .expect("Failed to write config");

    let config = ConfigLoader::load_file(&config_path).expect("Failed to load config");
    assert_eq!(config.block_size.bytes(), 64);

    let data = pattern(64 * 10 + 3);
    let src = write_source(&temp_dir, "src", &data);
    let dst = temp_dir.path().join("dst");
    assert_eq!(FileOps::new(config).copy(&src, &dst), StatusCode::Success);
    assert_eq!(std::fs::read(&dst).unwrap(), data);
}
