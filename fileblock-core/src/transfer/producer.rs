// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Writer role: frame a source stream into the shared region.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::error::RoleError;
use crate::shm::SharedRegion;
use crate::transfer::{payload_capacity, FrameBuf, TransferStats};

/// Logs copy progress each time another 10% of the source has gone out.
struct Progress {
    total: u64,
    last_decile: Option<u64>,
}

impl Progress {
    fn new(total: Option<u64>) -> Self {
        Self {
            total: total.unwrap_or(0),
            last_decile: None,
        }
    }

    fn advance(&mut self, done: u64) {
        if self.total == 0 {
            return;
        }
        let percent = done.saturating_mul(100) / self.total;
        let decile = percent / 10;
        if self.last_decile != Some(decile) {
            self.last_decile = Some(decile);
            tracing::info!(
                percent = percent,
                bytes = done,
                total = self.total,
                "Copy progress"
            );
        }
    }
}

/// Open `source` and stream it through `region`, ending with the sentinel.
pub fn produce_file(region: &SharedRegion, source: &Path) -> Result<TransferStats, RoleError> {
    let file = File::open(source).map_err(|e| {
        tracing::error!(
            role = "writer",
            pid = std::process::id(),
            path = %source.display(),
            error = %e,
            "Failed to open source"
        );
        RoleError::Io {
            context: "opening source",
            source: e,
        }
    })?;

    let total = file.metadata().ok().map(|m| m.len());
    produce(region, file, total)
}

/// Stream `source` through `region` as a sequence of frames followed by
/// one sentinel frame.
///
/// Each frame carries as many bytes as fit; only the last data frame may
/// be short. The header always equals the payload actually copied.
///
/// # Errors
/// `NoPayloadRoom` if the region is too small to carry any payload; such a
/// region could only ever transport the sentinel.
pub fn produce<R: Read>(
    region: &SharedRegion,
    mut source: R,
    total: Option<u64>,
) -> Result<TransferStats, RoleError> {
    let mut stats = TransferStats::default();
    if payload_capacity(region.capacity()) == 0 {
        return Err(writer_failed(
            &stats,
            RoleError::NoPayloadRoom {
                capacity: region.capacity(),
            },
        ));
    }

    let mut frame = FrameBuf::new(region.capacity());
    let mut progress = Progress::new(total);

    loop {
        let n = fill(&mut source, frame.payload_mut())
            .map_err(|e| writer_failed(&stats, e))?;
        if n == 0 {
            break;
        }

        send(region, frame.seal(n)).map_err(|e| writer_failed(&stats, e))?;

        stats.frames += 1;
        stats.bytes += n as u64;
        progress.advance(stats.bytes);
    }

    send(region, frame.sentinel()).map_err(|e| writer_failed(&stats, e))?;

    tracing::debug!(
        role = "writer",
        pid = std::process::id(),
        frames = stats.frames,
        bytes = stats.bytes,
        "Sent end-of-stream"
    );

    Ok(stats)
}

/// Hand one sealed frame to the region, rejecting any truncation.
fn send(region: &SharedRegion, bytes: &[u8]) -> Result<(), RoleError> {
    let written = region.write_raw(bytes)?;
    if written != bytes.len() {
        return Err(RoleError::ShortTransfer {
            expected: bytes.len(),
            actual: written,
        });
    }
    Ok(())
}

/// Read until `buf` is full or the source is exhausted.
fn fill<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize, RoleError> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(RoleError::Io {
                    context: "reading source",
                    source: e,
                })
            }
        }
    }
    Ok(filled)
}

fn writer_failed(stats: &TransferStats, err: RoleError) -> RoleError {
    tracing::error!(
        role = "writer",
        pid = std::process::id(),
        offset = stats.bytes,
        frames = stats.frames,
        error = %err,
        "Writer failed"
    );
    err
}
