//! Argument definitions for the `tend` binary.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser)]
#[command(name = "tend")]
#[command(about = "tend - note vault lifecycle and promotion engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (TOML). When omitted, the vault root must be given
    /// with --vault and defaults apply for everything else.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Vault root directory (overrides the config file's root)
    #[arg(long, global = true)]
    pub vault: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Promote a single note if it meets the quality threshold
    Promote {
        /// Note identifier (file stem)
        id: String,

        /// Override the configured promotion threshold
        #[arg(short = 't', long)]
        threshold: Option<f64>,

        /// Report what would happen without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Promote every eligible inbox note, oldest first
    AutoPromote {
        /// Override the configured promotion threshold
        #[arg(short = 't', long)]
        threshold: Option<f64>,

        /// Only consider notes of this type (fleeting, literature, permanent)
        #[arg(long = "type")]
        type_filter: Option<String>,

        /// Report what would happen without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Mark a promoted note as processed
    MarkProcessed {
        /// Note identifier (file stem)
        id: String,

        /// Report what would happen without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List notes whose declared status disagrees with their directory
    ScanOrphans,

    /// Repair orphaned notes (takes a whole-vault backup first)
    RepairOrphans {
        /// Report what would happen without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Watch the vault and run the ingestion pipeline on changed notes
    Watch,
}
