//! CLI argument parsing for modstat

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Fixed-width text table (default)
    Text,
    /// JSON for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "modstat")]
#[command(version)]
#[command(about = "Infer software module usage from HPC job scripts", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); the embedded defaults apply otherwise
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (e.g. warn, info, modstat=debug); overrides RUST_LOG
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Append logs to FILE instead of stderr
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk the module repository and write the executable table
    Index {
        /// Table to write
        #[arg(short, long, value_name = "FILE", default_value = "executables.txt")]
        output: PathBuf,

        /// Write `epoch module version executable` lines instead of pairs
        #[arg(long)]
        tuples: bool,
    },

    /// Scan a corpus of job scripts and rank module usage
    Scan {
        /// Directory searched recursively for job scripts
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Reuse a table written by `index` instead of walking the repository
        #[arg(short = 'x', long = "executables", value_name = "FILE")]
        executables: Option<PathBuf>,

        /// Number of modules to rank
        #[arg(short = 'n', long = "top", value_name = "N", default_value = "50")]
        top: usize,

        /// Shuffle scripts before scanning
        #[arg(long)]
        shuffle: bool,

        /// Seed for --shuffle
        #[arg(long, value_name = "SEED", default_value = "0")]
        seed: u64,

        /// Scan at most N scripts
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Worker threads
        #[arg(short = 'j', long = "jobs", value_name = "N", default_value = "1")]
        jobs: usize,

        /// Output format
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the ranking to FILE instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Rank `epoch/module/version` keys instead of bare modules
        #[arg(long)]
        versions: bool,
    },

    /// Show what a single job script loads and calls
    Inspect {
        /// Job script; its metadata record must sit next to it
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Output format
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },
}
