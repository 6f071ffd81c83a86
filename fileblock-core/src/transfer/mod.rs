// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Transfer protocol layered on the shared region.
//!
//! The writer role frames the source into length-prefixed blocks and ends
//! with a zero-length sentinel; the reader role drains blocks in order
//! until it sees the sentinel. File size never travels out-of-band.

mod consumer;
mod frame;
mod producer;

pub use consumer::{consume, consume_file};
pub use frame::{payload_capacity, FrameBuf, HEADER_SIZE};
pub use producer::{produce, produce_file};

/// Frames and payload bytes moved by one role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Data frames, not counting the sentinel.
    pub frames: u64,
    pub bytes: u64,
}
