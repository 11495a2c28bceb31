//! Command-line interface for signflow
//!
//! Provides argument parsing using clap derive macros.

use crate::config::PerformancePreset;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sign language recognition from landmark recordings
#[derive(Parser, Debug)]
#[command(
    name = "signflow",
    version,
    about = "Sign language recognition from landmark recordings"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines landmark recording and print gloss events
    Replay {
        /// Recording file, one landmark frame per line ("-" for stdin)
        #[arg(value_name = "FRAMES")]
        frames: PathBuf,

        /// Classifier weights (.safetensors)
        #[arg(long, value_name = "FILE")]
        model: Option<PathBuf>,

        /// Label file (.json array or one label per line)
        #[arg(long, value_name = "FILE")]
        labels: Option<PathBuf>,

        /// Feature scaler (.json with mean and scale)
        #[arg(long, value_name = "FILE")]
        scaler: Option<PathBuf>,

        /// Performance preset (low, balanced, high)
        #[arg(long, value_name = "PRESET")]
        preset: Option<PerformancePreset>,

        /// Pace frames by their timestamps instead of as fast as possible
        #[arg(long)]
        realtime: bool,

        /// Do not send the pending sequence when the recording ends
        #[arg(long)]
        no_commit: bool,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a configuration value by key (e.g., features.window_frames)
    Get {
        /// Dotted key path (e.g., stability.min_stable_frames, assets.model)
        key: String,
    },
    /// Print the effective configuration as TOML
    List,
    /// Print the default configuration file path
    Path,
}
