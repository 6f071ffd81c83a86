// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fblk delete` command.

use std::path::Path;

use fileblock_core::{Config, FileOps};

use super::{check, CliError};

pub fn execute(config: &Config, path: &Path, isolated: bool) -> Result<(), CliError> {
    tracing::info!(path = %path.display(), isolated, "Deleting");

    let ops = FileOps::new(config.clone());
    let status = if isolated {
        ops.delete_isolated(path)
    } else {
        ops.delete(path)
    };
    check("delete", status)?;

    println!("✓ Deleted {}", path.display());
    Ok(())
}
