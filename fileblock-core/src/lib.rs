//! FileBlock Core Library
//!
//! Moves a file from one process to another through a single fixed-size
//! POSIX shared memory block. A writer and a reader process take turns on
//! the block under a pair of named semaphores; the calling process only
//! orchestrates and never touches the data path itself.

pub mod config;
pub mod error;
pub mod logging;
pub mod ops;
pub mod process;
pub mod shm;
pub mod task;
pub mod transfer;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigLoader};
pub use error::{
    FileBlockError, FileBlockResult, HardValidationError, ProcessError, RegionError, RoleError,
    TaskError, TransferError,
};
pub use ops::FileOps;
pub use process::{Orchestrator, TransferReport};
pub use shm::SharedRegion;
pub use task::{run_in_process, TaskOutcome};
pub use types::{BlockSize, ProcessRole, SessionName, StatusCode};
