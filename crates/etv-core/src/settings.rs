use chrono_tz::Tz;
use clap::Parser;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::time_utils::resolve_timezone;

/// Default base temperature (°C) of the HDD series.
pub const DEFAULT_HDD_BASELINE_C: f64 = 15.5;

/// Input directory under the home directory when none is given.
pub const DEFAULT_INPUT_DIR_NAME: &str = "ETV-prepared-data";
/// Output directory under the home directory when none is given.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "ETV-prepared-data-out";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Per-household space-heating efficiency statistics from bulk energy, HDD
/// and device log data
#[derive(Parser, Debug, Clone)]
#[command(
    name = "etv",
    about = "Per-household space-heating efficiency statistics from bulk energy and HDD data",
    version
)]
pub struct Settings {
    /// Directory containing HDD.csv, NkWh.csv and optional grouping/log files
    #[arg(long, env = "ETV_INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// Directory to write the output CSV files to (may equal the input directory)
    #[arg(long, env = "ETV_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Local time zone of the households ("auto" for the system zone)
    #[arg(long, default_value = "Europe/London")]
    pub timezone: String,

    /// Base temperature in °C of the HDD data
    #[arg(long, default_value_t = DEFAULT_HDD_BASELINE_C)]
    pub hdd_baseline: f64,

    /// Worker threads for per-household computation (0 = one per core)
    #[arg(long, default_value = "0")]
    pub threads: usize,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,
}

// ── PipelineConfig ─────────────────────────────────────────────────────────────

/// Validated, immutable configuration for one computation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub timezone: Tz,
    pub hdd_baseline_c: f64,
}

impl PipelineConfig {
    /// Configuration with the UK defaults for the given directories.
    pub fn new(input_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            timezone: crate::time_utils::DEFAULT_TIMEZONE,
            hdd_baseline_c: DEFAULT_HDD_BASELINE_C,
        }
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Resolve defaults and validate into a [`PipelineConfig`].
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Ok(PipelineConfig {
            input_dir: self
                .input_dir
                .clone()
                .unwrap_or_else(|| home.join(DEFAULT_INPUT_DIR_NAME)),
            output_dir: self
                .output_dir
                .clone()
                .unwrap_or_else(|| home.join(DEFAULT_OUTPUT_DIR_NAME)),
            timezone: resolve_timezone(&self.timezone)?,
            hdd_baseline_c: self.hdd_baseline,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
