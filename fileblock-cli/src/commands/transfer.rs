// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fblk copy` and `fblk move` commands.

use std::path::Path;

use fileblock_core::{Config, FileOps};

use super::{check, CliError};

pub fn copy(config: &Config, src: &Path, dst: &Path, isolated: bool) -> Result<(), CliError> {
    tracing::info!(src = %src.display(), dst = %dst.display(), isolated, "Copying");

    let ops = FileOps::new(config.clone());
    let status = if isolated {
        ops.copy_isolated(src, dst)
    } else {
        ops.copy(src, dst)
    };
    check("copy", status)?;

    println!("✓ Copied {} -> {}", src.display(), dst.display());
    Ok(())
}

pub fn move_file(config: &Config, src: &Path, dst: &Path, isolated: bool) -> Result<(), CliError> {
    tracing::info!(src = %src.display(), dst = %dst.display(), isolated, "Moving");

    let ops = FileOps::new(config.clone());
    let status = if isolated {
        ops.move_isolated(src, dst)
    } else {
        ops.move_file(src, dst)
    };
    check("move", status)?;

    println!("✓ Moved {} -> {}", src.display(), dst.display());
    Ok(())
}
