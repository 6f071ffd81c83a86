// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fblk validate` command - Validate configuration file.

use std::path::Path;

use fileblock_core::transfer::payload_capacity;
use fileblock_core::ConfigLoader;

use super::CliError;

pub fn execute(file: &Path) -> Result<(), CliError> {
    tracing::info!(file = %file.display(), "Validating configuration");

    let config = ConfigLoader::load_file(file)?;

    println!("✓ Configuration is valid");
    println!();
    println!("Transfer Settings:");
    println!("  Block Size:         {}", config.block_size);
    println!(
        "  Payload per Frame:  {} bytes",
        payload_capacity(config.block_size.bytes())
    );
    println!("  Session Prefix:     {}", config.session_prefix);
    match &config.log_path {
        Some(path) => println!("  Log File:           {}", path.display()),
        None => println!("  Log File:           (stderr)"),
    }
    Ok(())
}
