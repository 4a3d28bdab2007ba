//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "ranger", version, about = "Radar ranging CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/ranger.toml")]
    pub config: PathBuf,

    /// Print reports and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calibrate the sensor and print one report per detected frame
    Run {
        /// Stop after this many frames (default: until Ctrl-C)
        #[arg(long, value_name = "N")]
        frames: Option<u64>,
        /// Target distance of the simulated sensor in metres
        #[arg(long = "target-m", value_name = "M", default_value_t = 0.35)]
        target_m: f32,
    },
    /// Apply the configured correction tables to a raw distance
    Correct {
        /// Raw distance in millimetres
        #[arg(
            long,
            value_name = "MM",
            allow_hyphen_values = true,
            required_unless_present = "batch"
        )]
        mm: Option<f32>,
        /// Map a sensor reading back to its true position via the lookup table
        #[arg(long, action = ArgAction::SetTrue)]
        reverse: bool,
        /// CSV whose first column holds sensor readings; true positions are appended
        #[arg(long, value_name = "FILE", conflicts_with = "mm", requires = "out")]
        batch: Option<PathBuf>,
        /// Output CSV for --batch
        #[arg(long, value_name = "FILE", requires = "batch")]
        out: Option<PathBuf>,
    },
    /// Compile raw encoder/sensor samples into a lookup table
    CompileTable {
        /// Samples CSV with headers position_mm,distance_mm
        #[arg(long, value_name = "FILE")]
        samples: PathBuf,
        /// Output lookup CSV
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Bin width in millimetres
        #[arg(long = "bin-mm", value_name = "MM", default_value_t = 1.0)]
        bin_mm: f32,
        /// Reduce each bin by its median instead of its mean
        #[arg(long, action = ArgAction::SetTrue)]
        median: bool,
        /// Also write a dense per-millimetre error table
        #[arg(long = "error-out", value_name = "FILE")]
        error_out: Option<PathBuf>,
        /// Length of the error table in millimetres
        #[arg(long = "max-mm", value_name = "MM", default_value_t = 1000)]
        max_mm: usize,
    },
    /// Validate the config and load the correction tables
    SelfCheck,
}

impl Commands {
    /// Commands that work on files only and need no config.
    pub fn needs_config(&self) -> bool {
        !matches!(self, Commands::CompileTable { .. })
    }
}
