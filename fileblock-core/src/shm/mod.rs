// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared Memory IPC module.
//!
//! A single fixed-size POSIX shared memory block handed back and forth
//! between one producer and one consumer process by a pair of named
//! binary semaphores (`empty`, `full`).

mod region;
mod semaphore;

pub use region::SharedRegion;
pub use semaphore::NamedSemaphore;
