//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// csvmorph: schema-driven CSV dialect and value conversion
#[derive(Parser)]
#[command(name = "csvmorph")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert CSV data from the input conventions to the output conventions
    Convert {
        /// Path to the JSON configuration file
        #[arg(short, long, value_name = "FILE")]
        config_file: PathBuf,

        /// Read data from this file instead of stdin
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Write data to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file and show it with defaults filled in
    Check {
        /// Path to the JSON configuration file
        #[arg(short, long, value_name = "FILE")]
        config_file: PathBuf,

        /// Print the normalized configuration as JSON
        #[arg(long)]
        json: bool,
    },
}
