// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gitbay - a git-operations service for automation clients.
//!
//! This is the binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gitbay::{doctor, serve};
use gitbay_config::{load_config, load_config_from_path, validate_config};

/// Gitbay - a git-operations service for automation clients.
#[derive(Parser, Debug)]
#[command(name = "gitbay", version, about, long_about = None)]
struct Cli {
    /// Path to an explicit config file (otherwise the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gitbay service on stdin/stdout.
    Serve,
    /// Check the environment: config, git binary, workspace root, database.
    Doctor,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Serve => {
            if let Err(errors) = validate_config(&config) {
                eprint!("{}", gitbay_config::diagnostic::render_errors(&errors));
                return ExitCode::FAILURE;
            }
            match serve::run_serve(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Doctor => {
            if doctor::run_doctor(config).await {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
