//! Ranging run: hardware assembly, report printing, loop execution.

use ranger_core::RangingLoop;
use ranger_core::conversions::run_params;
use ranger_core::error::Result as CoreResult;
use ranger_core::runner::LoopStats;
use ranger_hardware::{SimGeometry, SimulatedControl, SimulatedRadar};
use ranger_traits::{BoxError, DistanceSink, MonotonicClock, RangeReport, SensorControl};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Prints each report as a text line or a JSON object on stdout.
pub struct ReportPrinter {
    json: bool,
}

impl ReportPrinter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl DistanceSink for ReportPrinter {
    fn send(&mut self, r: &RangeReport) -> Result<(), BoxError> {
        let mut out = std::io::stdout().lock();
        if self.json {
            let line = serde_json::json!({
                "distance_m": r.distance_m,
                "frame_distance_m": r.frame_distance_m,
                "crossing_distance_m": r.crossing_distance_m,
                "crossing_amplitude": r.crossing_amplitude,
                "threshold": r.threshold,
                "max_amplitude": r.max_amplitude,
                "divisor": r.divisor,
                "temperature_c": r.temperature_c,
                "since_last_ms": r.since_last_ms,
            });
            writeln!(out, "{line}")?;
        } else {
            writeln!(
                out,
                "distance: {:.4} m (frame {:.4} m, amplitude {}, threshold {:.1}, peak {}, {} C, +{} ms)",
                r.distance_m,
                r.frame_distance_m,
                r.crossing_amplitude,
                r.threshold,
                r.max_amplitude,
                r.temperature_c,
                r.since_last_ms
            )?;
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.is_empty() && v != "0")
}

/// Simulated frame source shaped after the configured range.
fn simulated_radar(cfg: &ranger_config::Config, target_m: f32) -> SimulatedRadar {
    let geometry = SimGeometry {
        start_point: cfg.range.start_point,
        step_length: cfg.range.step_length,
        num_points: cfg.range.num_points,
        sweeps_per_frame: cfg.range.sweeps_per_frame,
        rf_factor: cfg.range.rf_factor,
    };
    SimulatedRadar::new(geometry, target_m)
        .with_failing_calibration(env_flag("RANGER_SIM_CAL_FAIL"))
}

fn frame_period(cfg: &ranger_config::Config) -> CoreResult<Duration> {
    let hz = cfg.sensor.frame_rate_hz;
    Duration::try_from_secs_f32(1.0 / hz)
        .map_err(|e| eyre::eyre!("sensor.frame_rate_hz must give a valid frame period, got {hz}: {e}"))
}

pub fn run_ranging(
    cfg: &ranger_config::Config,
    frames: Option<u64>,
    target_m: f32,
    json: bool,
    shutdown: Arc<AtomicBool>,
) -> CoreResult<LoopStats> {
    let corrector = ranger_core::conversions::load_corrector(&cfg.correction)?;
    if corrector.is_configured() {
        tracing::info!(
            lookup = corrector.lookup_table().map(|t| t.len()),
            error = corrector.error_table().map(|t| t.len()),
            tolerance_mm = corrector.tolerance_mm(),
            "distance correction enabled"
        );
    }
    let params = run_params(cfg, corrector);
    let radar = simulated_radar(cfg, target_m);

    #[cfg(feature = "hardware")]
    {
        if let Some(pins) = cfg.pins {
            let control =
                ranger_hardware::hardware::GpioControl::try_new(pins.enable, pins.interrupt)
                    .map_err(|e| eyre::eyre!("open sensor pins: {e}"))?;
            tracing::info!(enable = pins.enable, interrupt = pins.interrupt, "GPIO sensor control");
            return drive(radar, control, params, frames, json, &shutdown);
        }
    }

    let control = SimulatedControl::new()
        .with_never_interrupt(env_flag("RANGER_SIM_TIMEOUT"))
        .with_frame_period(frame_period(cfg)?);
    drive(radar, control, params, frames, json, &shutdown)
}

fn drive<C: SensorControl>(
    radar: SimulatedRadar,
    control: C,
    params: ranger_core::RunParams,
    frames: Option<u64>,
    json: bool,
    shutdown: &AtomicBool,
) -> CoreResult<LoopStats> {
    let mut ranging = RangingLoop::new(
        radar,
        control,
        ReportPrinter::new(json),
        MonotonicClock::new(),
        params,
    )?;
    tracing::info!(frames, "ranging start");
    let stats = ranging.run(frames, shutdown)?;
    Ok(stats)
}

pub fn print_summary(stats: &LoopStats, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "summary": {
                    "frames": stats.frames,
                    "delivered": stats.delivered,
                    "skipped": stats.skipped,
                    "recalibrations": stats.recalibrations,
                    "send_failures": stats.send_failures,
                }
            })
        );
    } else {
        println!(
            "frames: {} delivered: {} skipped: {} recalibrations: {} send failures: {}",
            stats.frames, stats.delivered, stats.skipped, stats.recalibrations, stats.send_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(frame_rate_hz: f32) -> ranger_config::Config {
        let mut cfg = ranger_config::load_toml(
            r#"
[range]
start_point = 80
step_length = 1
num_points = 160
x_intercepts = [0.2, 0.3, 0.45, 0.6]
lines = [{ slope = -4000.0, y_intercept = 2000.0 }, { slope = -1000.0, y_intercept = 1100.0 }, { slope = 0.0, y_intercept = 650.0 }]
"#,
        )
        .unwrap();
        cfg.sensor.frame_rate_hz = frame_rate_hz;
        cfg
    }

    #[test]
    fn frame_period_follows_rate() {
        assert_eq!(frame_period(&config(50.0)).unwrap(), Duration::from_millis(20));
    }

    #[test]
    fn unrepresentable_frame_period_is_an_error() {
        let err = frame_period(&config(1e-39)).unwrap_err();
        assert!(format!("{err}").contains("sensor.frame_rate_hz"));
    }
}
