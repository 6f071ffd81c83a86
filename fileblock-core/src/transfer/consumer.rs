// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Reader role: rebuild the destination from frames in the shared region.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::RoleError;
use crate::shm::SharedRegion;
use crate::transfer::{payload_capacity, FrameBuf, TransferStats};

/// Create (or truncate) `destination` and drain `region` into it.
pub fn consume_file(region: &SharedRegion, destination: &Path) -> Result<TransferStats, RoleError> {
    let file = File::create(destination).map_err(|e| {
        tracing::error!(
            role = "reader",
            pid = std::process::id(),
            path = %destination.display(),
            error = %e,
            "Failed to open destination"
        );
        RoleError::Io {
            context: "opening destination",
            source: e,
        }
    })?;

    let stats = consume(region, &file)?;

    file.sync_all().map_err(|e| {
        reader_failed(
            &stats,
            RoleError::Io {
                context: "syncing destination",
                source: e,
            },
        )
    })?;

    Ok(stats)
}

/// Read whole blocks from `region` until the sentinel, writing each
/// payload to `sink` in order.
pub fn consume<W: Write>(region: &SharedRegion, mut sink: W) -> Result<TransferStats, RoleError> {
    let mut stats = TransferStats::default();
    if payload_capacity(region.capacity()) == 0 {
        return Err(reader_failed(
            &stats,
            RoleError::NoPayloadRoom {
                capacity: region.capacity(),
            },
        ));
    }

    let mut frame = FrameBuf::new(region.capacity());

    loop {
        region
            .read_raw(frame.block_mut())
            .map_err(|e| reader_failed(&stats, e.into()))?;

        let payload = match frame.decode() {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(e) => return Err(reader_failed(&stats, e)),
        };

        sink.write_all(payload).map_err(|e| {
            reader_failed(
                &stats,
                RoleError::Io {
                    context: "writing destination",
                    source: e,
                },
            )
        })?;

        stats.frames += 1;
        stats.bytes += payload.len() as u64;
    }

    sink.flush().map_err(|e| {
        reader_failed(
            &stats,
            RoleError::Io {
                context: "flushing destination",
                source: e,
            },
        )
    })?;

    tracing::debug!(
        role = "reader",
        pid = std::process::id(),
        frames = stats.frames,
        bytes = stats.bytes,
        "Received end-of-stream"
    );

    Ok(stats)
}

fn reader_failed(stats: &TransferStats, err: RoleError) -> RoleError {
    tracing::error!(
        role = "reader",
        pid = std::process::id(),
        offset = stats.bytes,
        frames = stats.frames,
        error = %err,
        "Reader failed"
    );
    err
}
