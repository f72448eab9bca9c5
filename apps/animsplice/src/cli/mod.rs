//! # animsplice CLI Module
//!
//! ## Available Commands
//!
//! - `merge` - Splice a source graph into a destination graph
//! - `inspect` - Summarise a graph document
//! - `hash` - Compute checksums of a graph document

mod commands;

use animsplice_core::SpliceError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// animsplice - animation state graph splicer
///
/// Copies the layers and parameters of one graph into another, renaming
/// parameters and rewriting clip binding paths on the way.
#[derive(Parser, Debug)]
#[command(name = "animsplice")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge a source graph into a destination graph
    Merge {
        /// Source graph document
        #[arg(short, long)]
        source: PathBuf,

        /// Destination graph document
        #[arg(short, long)]
        dest: PathBuf,

        /// Merge configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output document; the format follows the extension
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Summarise a graph document
    Inspect {
        /// Input document
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Compute checksum and BLAKE3 hash of a graph document
    Hash {
        /// Input document
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), SpliceError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Merge {
            source,
            dest,
            config,
            output,
        } => cmd_merge(&source, &dest, config.as_deref(), &output, json_mode, cli.quiet),
        Commands::Inspect { input } => cmd_inspect(&input, json_mode),
        Commands::Hash { input } => cmd_hash(&input, json_mode),
    }
}
