//! flagsync CLI
//!
//! Command-line tools for inspecting FDv2 data.
//!
//! # Commands
//!
//! - `replay` - Replay a recorded event stream and show the resulting payloads
//! - `convert` - Convert an FDv1 data set into an FDv2 transfer

mod commands;
mod sse;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// flagsync command-line tools.
#[derive(Parser)]
#[command(name = "flagsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded text/event-stream transcript
    Replay {
        /// Path to the transcript
        file: PathBuf,

        /// Object kinds to accept
        #[arg(short, long, value_delimiter = ',', default_value = "flag,segment")]
        kinds: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Convert an FDv1 {flags, segments} document into an FDv2 transfer
    Convert {
        /// Path to the FDv1 JSON document
        file: PathBuf,

        /// Selector to report instead of the empty string
        #[arg(short, long)]
        selector: Option<String>,

        /// Print the synthetic event sequence instead of the payload
        #[arg(short, long)]
        events: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            file,
            kinds,
            format,
        } => {
            commands::replay::run(&file, &kinds, &format)?;
        }
        Commands::Convert {
            file,
            selector,
            events,
        } => {
            commands::convert::run(&file, selector.as_deref(), events)?;
        }
        Commands::Version => {
            println!("flagsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
