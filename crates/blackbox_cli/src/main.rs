//! Blackbox CLI
//!
//! Command-line tools for blackbox record stores.
//!
//! # Commands
//!
//! - `inspect` - List the files of a box with their time bounds
//! - `verify` - Check page and part structure of every file
//! - `dump` - Print records in time order
//! - `convert` - Replay one box into another

mod commands;

use blackbox_core::{BlackBox, Location, Stamp};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Blackbox command-line tools.
#[derive(Parser)]
#[command(name = "bbx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the box files
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// File name prefix of the box
    #[arg(global = true, long, default_value = "")]
    prefix: String,

    /// File name suffix of the box
    #[arg(global = true, long, default_value = ".bbx")]
    suffix: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List box files, their time bounds and metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify page and part structure
    Verify,

    /// Print records in time order
    Dump {
        /// Start at the record closest to this stamp (epoch seconds)
        #[arg(long)]
        from: Option<i64>,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Walk from newest to oldest
        #[arg(short, long)]
        backward: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replay the box into another location
    Convert {
        /// Target directory
        #[arg(long)]
        to_dir: PathBuf,

        /// Target file name prefix (defaults to the source prefix)
        #[arg(long)]
        to_prefix: Option<String>,

        /// Target file name suffix (defaults to the source suffix)
        #[arg(long)]
        to_suffix: Option<String>,

        /// Leave incoming and outbox packages out
        #[arg(long)]
        skip_packages: bool,
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

    let bb = BlackBox::new();
    let location = |command: &str| -> Result<Location, Box<dyn std::error::Error>> {
        let dir = cli
            .dir
            .clone()
            .ok_or_else(|| format!("Box directory required for {command}"))?;
        Ok(bb.location(dir, cli.prefix.clone(), cli.suffix.clone()))
    };

    match &cli.command {
        Commands::Inspect { format } => {
            commands::inspect::run(&location("inspect")?, format)?;
        }
        Commands::Verify => {
            commands::verify::run(&location("verify")?)?;
        }
        Commands::Dump {
            from,
            limit,
            backward,
            format,
        } => {
            let options = commands::dump::DumpOptions {
                from: from.map(Stamp::new),
                limit: *limit,
                forward: !backward,
            };
            commands::dump::run(&bb, &location("dump")?, &options, format)?;
        }
        Commands::Convert {
            to_dir,
            to_prefix,
            to_suffix,
            skip_packages,
        } => {
            let source = location("convert")?;
            let target = bb.location(
                to_dir.clone(),
                to_prefix.clone().unwrap_or_else(|| cli.prefix.clone()),
                to_suffix.clone().unwrap_or_else(|| cli.suffix.clone()),
            );
            commands::convert::run(&bb, &source, target, *skip_packages)?;
        }
        Commands::Version => {
            println!("Blackbox CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Blackbox Core v{}", blackbox_core::VERSION);
        }
    }

    Ok(())
}
