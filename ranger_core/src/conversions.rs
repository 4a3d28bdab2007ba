//! `From` implementations bridging `ranger_config` types to `ranger_core` types.

use crate::config::{LifecycleCfg, RangeConfig, SmoothingCfg, SmoothingMode, ThresholdLine};
use crate::correction::{CorrectionTable, DistanceCorrector, ErrorCorrectionTable, TableError};
use ranger_config::{ErrorRow, TableRow};
use ranger_traits::SensorSettings;
use std::time::Duration;

// ── RangeConfig ──────────────────────────────────────────────────────────────

impl From<&ranger_config::ThresholdLine> for ThresholdLine {
    fn from(l: &ranger_config::ThresholdLine) -> Self {
        Self {
            slope: l.slope,
            y_intercept: l.y_intercept,
        }
    }
}

impl From<&ranger_config::RangeCfg> for RangeConfig {
    fn from(c: &ranger_config::RangeCfg) -> Self {
        Self {
            start_point: c.start_point,
            step_length: c.step_length,
            num_points: c.num_points,
            sweeps_per_frame: c.sweeps_per_frame,
            rf_factor: c.rf_factor,
            x_intercepts: c.x_intercepts,
            lines: c.lines.each_ref().map(ThresholdLine::from),
        }
    }
}

// ── Sensor / lifecycle ───────────────────────────────────────────────────────

/// Front-end settings handed to the sensor's prepare primitive.
pub fn sensor_settings(c: &ranger_config::SensorCfg) -> SensorSettings {
    SensorSettings {
        frame_rate_hz: c.frame_rate_hz,
        profile: c.profile,
        receiver_gain: c.receiver_gain,
        prf: c.prf,
        hwaas: c.hwaas,
        phase_enhancement: c.phase_enhancement,
    }
}

impl From<&ranger_config::Config> for LifecycleCfg {
    fn from(c: &ranger_config::Config) -> Self {
        Self {
            calibration_retries: c.lifecycle.calibration_retries,
            interrupt_timeout: Duration::from_millis(c.lifecycle.interrupt_timeout_ms),
            sensor: sensor_settings(&c.sensor),
        }
    }
}

// ── SmoothingCfg ─────────────────────────────────────────────────────────────

impl From<&ranger_config::SmoothingCfg> for SmoothingCfg {
    fn from(c: &ranger_config::SmoothingCfg) -> Self {
        let mode = match c.mode {
            ranger_config::SmoothingMode::None => SmoothingMode::Passthrough,
            ranger_config::SmoothingMode::Average => SmoothingMode::Average,
            ranger_config::SmoothingMode::Weighted => SmoothingMode::Weighted {
                factor: c.wma_factor,
                start: c.wma_start,
            },
        };
        Self {
            mode,
            window: c.window,
        }
    }
}

// ── Correction tables ────────────────────────────────────────────────────────

impl TryFrom<&[TableRow]> for CorrectionTable {
    type Error = TableError;

    fn try_from(rows: &[TableRow]) -> Result<Self, Self::Error> {
        Self::new(rows.iter().map(|r| (r.position_mm, r.distance_mm)))
    }
}

impl TryFrom<&[ErrorRow]> for ErrorCorrectionTable {
    type Error = TableError;

    fn try_from(rows: &[ErrorRow]) -> Result<Self, Self::Error> {
        Self::new(rows.iter().map(|r| (r.distance_mm, r.error_mm)))
    }
}

/// Load the configured correction tables; no tables gives a passthrough corrector.
pub fn load_corrector(cfg: &ranger_config::CorrectionCfg) -> eyre::Result<DistanceCorrector> {
    let lookup = cfg
        .lookup_csv
        .as_deref()
        .map(|path| -> eyre::Result<CorrectionTable> {
            let rows = ranger_config::load_lookup_csv(path)?;
            Ok(CorrectionTable::try_from(rows.as_slice())?)
        })
        .transpose()?;
    let error = cfg
        .error_csv
        .as_deref()
        .map(|path| -> eyre::Result<ErrorCorrectionTable> {
            let rows = ranger_config::load_error_csv(path)?;
            Ok(ErrorCorrectionTable::try_from(rows.as_slice())?)
        })
        .transpose()?;
    Ok(DistanceCorrector::new(lookup, error).with_tolerance_mm(cfg.tolerance_mm))
}

/// Core run parameters from a validated config plus a loaded corrector.
pub fn run_params(
    cfg: &ranger_config::Config,
    corrector: DistanceCorrector,
) -> crate::runner::RunParams {
    crate::runner::RunParams {
        range: RangeConfig::from(&cfg.range),
        lifecycle: LifecycleCfg::from(cfg),
        smoothing: SmoothingCfg::from(&cfg.smoothing),
        corrector,
    }
}
