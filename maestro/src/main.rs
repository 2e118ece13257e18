/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Maestro allocation planner.
///
/// Example:
///   maestro -i data/case_study.yaml -o data/output
#[derive(Debug, Parser)]
#[command(
    name = "maestro",
    about = "Maestro – static callback/executor/core allocation planner",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML workload file.
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Directory the result tables are written to (created if absent).
    #[arg(short = 'o', long = "output-dir", default_value = "output")]
    output_dir: PathBuf,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        input = %cli.input.display(),
        output_dir = %cli.output_dir.display(),
        "Maestro starting up..."
    );

    if let Err(e) = maestro::run(&cli.input, &cli.output_dir) {
        error!("Planning failed: {:#}", e);
        process::exit(1);
    }
}
