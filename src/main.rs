// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "framepipe")]
#[command(about = "High-rate sensor frame capture and storage pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture frames into a raw sample file
    Run {
        /// Output file path (default: capture_TIMESTAMP.raw)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many frames (default: run until Ctrl-C)
        #[arg(short, long)]
        frames: Option<u64>,

        /// Nominal frame rate of the simulated source in Hz
        #[arg(long, default_value = "120")]
        fps: f64,

        /// Frame width in pixels
        #[arg(long, default_value = "640")]
        width: u32,

        /// Frame height in pixels
        #[arg(long, default_value = "480")]
        height: u32,

        /// Raw sample encoding (Mono12Packed, Mono16)
        #[arg(long, default_value = "Mono12Packed")]
        encoding: String,

        /// Derive output geometry from per-frame metadata instead of the
        /// layout queried at start
        #[arg(long)]
        metadata_geometry: bool,
    },

    /// Show the capture device's reported parameters
    Info,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=framepipe=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            output,
            frames,
            fps,
            width,
            height,
            encoding,
            metadata_geometry,
        } => cli::run_capture(cli::RunOptions {
            output,
            frames,
            fps,
            width,
            height,
            encoding,
            metadata_geometry,
        }),
        Commands::Info => cli::show_info(),
    }
}
