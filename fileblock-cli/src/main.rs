// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! FileBlock CLI
//!
//! Command-line interface for process-isolated shared-memory file transfers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fileblock_core::{logging, Config, ConfigLoader, FileBlockResult};

mod commands;

/// fblk - copy, move and delete files through an isolated shared-memory pipeline
#[derive(Parser)]
#[command(name = "fblk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults apply when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Shared memory block size in bytes (overrides the config file)
    #[arg(short, long, allow_negative_numbers = true)]
    pub block_size: Option<i64>,

    /// Log file path (overrides the config file; stderr when unset)
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy a file through shared memory
    Copy {
        src: PathBuf,
        dst: PathBuf,

        /// Run inside an isolated child process
        #[arg(short, long)]
        isolated: bool,
    },

    /// Copy a file, then delete the source
    Move {
        src: PathBuf,
        dst: PathBuf,

        /// Run inside an isolated child process
        #[arg(short, long)]
        isolated: bool,
    },

    /// Delete a single file
    Delete {
        path: PathBuf,

        /// Run inside an isolated child process
        #[arg(short, long)]
        isolated: bool,
    },

    /// Validate a configuration file and print the effective settings
    Validate {
        /// Path to the configuration file
        file: PathBuf,
    },
}

/// Config file (or defaults) with command-line overrides applied.
fn effective_config(cli: &Cli) -> FileBlockResult<Config> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_file(path)?,
        None => Config::default(),
    };
    if cli.block_size.is_some() {
        config = config.with_block_size(cli.block_size)?;
    }
    if cli.log_file.is_some() {
        config = config.with_log_path(cli.log_file.clone());
    }
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match effective_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if let Err(e) = logging::init(config.log_path.as_deref(), cli.verbose) {
        eprintln!("✗ {}", e);
        return ExitCode::FAILURE;
    }

    // Dispatch to command handlers
    let result = match cli.command {
        Commands::Copy { src, dst, isolated } => {
            commands::transfer::copy(&config, &src, &dst, isolated)
        }
        Commands::Move { src, dst, isolated } => {
            commands::transfer::move_file(&config, &src, &dst, isolated)
        }
        Commands::Delete { path, isolated } => commands::delete::execute(&config, &path, isolated),
        Commands::Validate { file } => commands::validate::execute(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::parse_from([
            "fblk",
            "--block-size",
            "4096",
            "--log-file",
            "/tmp/fblk.log",
            "copy",
            "a",
            "b",
        ]);
        let config = effective_config(&cli).unwrap();
        assert_eq!(config.block_size.bytes(), 4096);
        assert_eq!(config.log_path, Some(PathBuf::from("/tmp/fblk.log")));
    }

    #[test]
    fn test_non_positive_block_size_uses_default() {
        let cli = Cli::parse_from(["fblk", "--block-size", "-1", "delete", "x"]);
        assert_eq!(effective_config(&cli).unwrap().block_size.bytes(), 1024);
    }

    #[test]
    fn test_isolated_flag() {
        let cli = Cli::parse_from(["fblk", "move", "--isolated", "a", "b"]);
        assert!(matches!(cli.command, Commands::Move { isolated: true, .. }));
    }
}
