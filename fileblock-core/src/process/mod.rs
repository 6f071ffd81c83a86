// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Process isolation module.
//!
//! Fork-based child handles and the orchestrator that runs one writer and
//! one reader child per transfer session.

mod child;
mod orchestrator;

pub use child::{ChildProcess, ExitKind, ForkSpawner, Spawner, PANIC_EXIT_CODE};
pub use orchestrator::{Orchestrator, TransferReport};
