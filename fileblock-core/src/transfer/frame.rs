// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Length-prefixed frame layout inside one region block.
//!
//! ```text
//! +----------------------+-------------------------------------+
//! | length: u64 (native) | payload: length bytes               |
//! +----------------------+-------------------------------------+
//! ```
//!
//! A length of zero is the end-of-stream sentinel and carries no payload.

use crate::error::RoleError;

/// Size of the length field (one machine word).
pub const HEADER_SIZE: usize = std::mem::size_of::<u64>();

/// Payload bytes a single frame can carry in a block of `capacity` bytes.
pub const fn payload_capacity(capacity: usize) -> usize {
    capacity.saturating_sub(HEADER_SIZE)
}

/// A frame staged in a block-sized scratch buffer.
///
/// The producer fills `payload_mut()`, then seals the frame with the number
/// of bytes actually read, so the header always matches the payload.
pub struct FrameBuf {
    buf: Vec<u8>,
}

impl FrameBuf {
    /// Allocate a buffer spanning one full block.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(HEADER_SIZE)],
        }
    }

    /// Largest payload this buffer can hold.
    pub fn max_payload(&self) -> usize {
        payload_capacity(self.buf.len())
    }

    /// Writable payload area.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf[HEADER_SIZE..]
    }

    /// Write the header for `len` payload bytes and return the frame bytes
    /// (header plus payload).
    pub fn seal(&mut self, len: usize) -> &[u8] {
        let len = len.min(self.max_payload());
        self.buf[..HEADER_SIZE].copy_from_slice(&(len as u64).to_ne_bytes());
        &self.buf[..HEADER_SIZE + len]
    }

    /// Header-only end-of-stream frame.
    pub fn sentinel(&mut self) -> &[u8] {
        self.seal(0)
    }

    /// Whole block, for the consumer to read into.
    pub fn block_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Decode the frame currently held in the buffer.
    ///
    /// Returns `None` for the sentinel, or the payload slice otherwise.
    ///
    /// # Errors
    /// `CorruptFrame` if the header announces more payload than fits.
    pub fn decode(&self) -> Result<Option<&[u8]>, RoleError> {
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&self.buf[..HEADER_SIZE]);
        let length = u64::from_ne_bytes(header);

        if length == 0 {
            return Ok(None);
        }

        let max = self.max_payload();
        if length > max as u64 {
            return Err(RoleError::CorruptFrame { length, max });
        }

        let end = HEADER_SIZE + length as usize;
        Ok(Some(&self.buf[HEADER_SIZE..end]))
    }
}
