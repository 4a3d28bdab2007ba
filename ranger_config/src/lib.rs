#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and correction-table files for the ranging device.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated once at
//!   start-up; nothing here is mutated afterwards.
//! - `tables` loads correction tables from CSV with strict headers and compiles
//!   raw encoder/sensor samples into lookup and error tables.
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod tables;

pub use tables::{
    BinMethod, CompiledBin, ErrorRow, TableRow, append_converted_column, compile_samples,
    error_table_from_samples,
    load_error_csv, load_lookup_csv, load_samples_csv, write_error_csv, write_lookup_csv,
};

/// Largest frame the device keeps scratch space for.
pub const MAX_POINTS: u16 = 400;

/// Accepted sensor frame rates; outside this range the frame period is not representable.
pub const MIN_FRAME_RATE_HZ: f32 = 0.01;
pub const MAX_FRAME_RATE_HZ: f32 = 10_000.0;

/// One threshold line `threshold = slope * distance_m + y_intercept`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ThresholdLine {
    pub slope: f32,
    #[serde(default)]
    pub y_intercept: f32,
}

/// Range geometry and detection threshold.
///
/// Example:
/// ```toml
/// [range]
/// start_point = 80
/// step_length = 1
/// num_points = 160
/// x_intercepts = [0.2, 0.3, 0.5, 0.7]
///
/// [[range.lines]]
/// slope = -2000.0
/// y_intercept = 1200.0
/// ```
#[derive(Debug, Deserialize)]
pub struct RangeCfg {
    /// First measured point, in sensor step units (2.5 mm each before `rf_factor`).
    pub start_point: i32,
    pub step_length: u16,
    pub num_points: u16,
    #[serde(default = "default_sweeps")]
    pub sweeps_per_frame: u16,
    /// Divides the 2.5 mm base step; 1.0 for free-space propagation.
    #[serde(default = "default_rf_factor")]
    pub rf_factor: f32,
    /// Segment bounds in metres: [x0, x1], (x1, x2], (x2, x3].
    pub x_intercepts: [f32; 4],
    pub lines: [ThresholdLine; 3],
}

fn default_sweeps() -> u16 {
    1
}

fn default_rf_factor() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SensorCfg {
    pub frame_rate_hz: f32,
    pub profile: u8,
    pub receiver_gain: u8,
    pub prf: u8,
    /// Hardware averaging, 1..=511
    pub hwaas: u16,
    pub phase_enhancement: bool,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            frame_rate_hz: 50.0,
            profile: 1,
            receiver_gain: 16,
            prf: 0,
            hwaas: 16,
            phase_enhancement: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    /// Report the latest frame as-is.
    #[default]
    None,
    Average,
    Weighted,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SmoothingCfg {
    pub mode: SmoothingMode,
    /// Number of past frames kept.
    pub window: usize,
    /// Weight increment per slot, oldest to newest (weighted mode only).
    pub wma_factor: f32,
    /// Weight of the oldest slot (weighted mode only).
    pub wma_start: f32,
}

impl Default for SmoothingCfg {
    fn default() -> Self {
        Self {
            mode: SmoothingMode::None,
            window: 5,
            wma_factor: 1.0,
            wma_start: 1.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LifecycleCfg {
    /// Extra calibration attempts after the first; values below 1 are raised to 1.
    pub calibration_retries: u16,
    /// Max wait for the sensor interrupt (ms)
    pub interrupt_timeout_ms: u64,
}

impl Default for LifecycleCfg {
    fn default() -> Self {
        Self {
            calibration_retries: 1,
            interrupt_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CorrectionCfg {
    /// position_mm,distance_mm CSV
    pub lookup_csv: Option<PathBuf>,
    /// distance_mm,error_mm CSV
    pub error_csv: Option<PathBuf>,
    /// Prefer the lookup table when it disagrees with the error-corrected value by more than this.
    pub tolerance_mm: f32,
}

impl Default for CorrectionCfg {
    fn default() -> Self {
        Self {
            lookup_csv: None,
            error_csv: None,
            tolerance_mm: 2.0,
        }
    }
}

impl CorrectionCfg {
    /// Resolve relative table paths against `base` (usually the config file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        for p in [&mut self.lookup_csv, &mut self.error_csv]
            .into_iter()
            .flatten()
        {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }
}

/// GPIO lines of the sensor module (BCM numbering).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PinsCfg {
    /// Drives the sensor's enable input.
    pub enable: u8,
    /// Sensor interrupt output, high when data is ready.
    pub interrupt: u8,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub range: RangeCfg,
    /// Only used by builds with GPIO support.
    #[serde(default)]
    pub pins: Option<PinsCfg>,
    #[serde(default)]
    pub sensor: SensorCfg,
    #[serde(default)]
    pub smoothing: SmoothingCfg,
    #[serde(default)]
    pub lifecycle: LifecycleCfg,
    #[serde(default)]
    pub correction: CorrectionCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Range
        let r = &self.range;
        if r.num_points == 0 {
            eyre::bail!("range.num_points must be >= 1");
        }
        if r.num_points > MAX_POINTS {
            eyre::bail!("range.num_points must be <= {MAX_POINTS}");
        }
        if r.step_length == 0 {
            eyre::bail!("range.step_length must be >= 1");
        }
        if r.sweeps_per_frame == 0 {
            eyre::bail!("range.sweeps_per_frame must be >= 1");
        }
        if !(r.rf_factor.is_finite() && r.rf_factor > 0.0) {
            eyre::bail!("range.rf_factor must be a positive number");
        }
        if r.x_intercepts.iter().any(|x| !x.is_finite()) {
            eyre::bail!("range.x_intercepts must be finite");
        }
        if r.x_intercepts.windows(2).any(|w| w[1] < w[0]) {
            eyre::bail!("range.x_intercepts must be ascending");
        }
        if r
            .lines
            .iter()
            .any(|l| !(l.slope.is_finite() && l.y_intercept.is_finite()))
        {
            eyre::bail!("range.lines must have finite slope and y_intercept");
        }

        if let Some(p) = self.pins
            && p.enable == p.interrupt
        {
            eyre::bail!("pins.enable and pins.interrupt must be different pins");
        }

        // Sensor
        if !(MIN_FRAME_RATE_HZ..=MAX_FRAME_RATE_HZ).contains(&self.sensor.frame_rate_hz) {
            eyre::bail!(
                "sensor.frame_rate_hz must be in [{MIN_FRAME_RATE_HZ}, {MAX_FRAME_RATE_HZ}]"
            );
        }
        if !(1..=511).contains(&self.sensor.hwaas) {
            eyre::bail!("sensor.hwaas must be in [1, 511]");
        }

        // Smoothing
        if self.smoothing.window == 0 {
            eyre::bail!("smoothing.window must be >= 1");
        }
        if self.smoothing.mode == SmoothingMode::Weighted
            && !(self.smoothing.wma_factor.is_finite() && self.smoothing.wma_start.is_finite())
        {
            eyre::bail!("smoothing.wma_factor and smoothing.wma_start must be finite");
        }

        // Lifecycle
        if self.lifecycle.interrupt_timeout_ms == 0 {
            eyre::bail!("lifecycle.interrupt_timeout_ms must be >= 1");
        }

        // Correction
        if !(self.correction.tolerance_mm.is_finite() && self.correction.tolerance_mm >= 0.0) {
            eyre::bail!("correction.tolerance_mm must be >= 0");
        }

        Ok(())
    }

    /// Samples the sensor delivers per frame.
    pub fn frame_len(&self) -> usize {
        usize::from(self.range.num_points) * usize::from(self.range.sweeps_per_frame)
    }
}
