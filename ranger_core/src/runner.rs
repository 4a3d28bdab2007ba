use crate::config::{LifecycleCfg, RangeConfig, SmoothingCfg};
use crate::correction::DistanceCorrector;
use crate::error::{BuildError, RangerError, Result};
use crate::estimator::{EstimateOutcome, estimate};
use crate::hw_error::map_hw_error;
use crate::lifecycle::{CalibrationState, SensorLifecycle};
use crate::smoothing::SmoothingBuffer;
use crate::status::FrameStatus;
use eyre::WrapErr;
use ranger_traits::{Clock, DistanceSink, RadarSensor, RangeReport, SensorControl};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Everything the ranging loop needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub range: RangeConfig,
    pub lifecycle: LifecycleCfg,
    pub smoothing: SmoothingCfg,
    pub corrector: DistanceCorrector,
}

/// Counters kept across `step` calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub delivered: u64,
    pub skipped: u64,
    pub recalibrations: u64,
    pub send_failures: u64,
}

/// Single-threaded measure → estimate → correct → smooth → send loop.
pub struct RangingLoop<S, C, K, Clk> {
    sensor: S,
    control: C,
    sink: K,
    clock: Clk,
    lifecycle: SensorLifecycle,
    range: RangeConfig,
    corrector: DistanceCorrector,
    smoothing: SmoothingBuffer,
    last_sent: Option<Instant>,
    stats: LoopStats,
}

impl<S, C, K, Clk> RangingLoop<S, C, K, Clk>
where
    S: RadarSensor,
    C: SensorControl,
    K: DistanceSink,
    Clk: Clock,
{
    pub fn new(
        sensor: S,
        control: C,
        sink: K,
        clock: Clk,
        params: RunParams,
    ) -> std::result::Result<Self, BuildError> {
        let RunParams {
            range,
            lifecycle,
            smoothing,
            corrector,
        } = params;
        if range.num_points == 0 {
            return Err(BuildError::InvalidConfig("num_points must be >= 1"));
        }
        if range.sweeps_per_frame == 0 {
            return Err(BuildError::InvalidConfig("sweeps_per_frame must be >= 1"));
        }
        if !(range.rf_factor.is_finite() && range.rf_factor > 0.0) {
            return Err(BuildError::InvalidConfig("rf_factor must be a positive number"));
        }
        if lifecycle.interrupt_timeout.is_zero() {
            return Err(BuildError::InvalidConfig("interrupt_timeout must be > 0"));
        }
        Ok(Self {
            sensor,
            control,
            sink,
            clock,
            lifecycle: SensorLifecycle::new(&lifecycle),
            range,
            corrector,
            smoothing: SmoothingBuffer::new(&smoothing),
            last_sent: None,
            stats: LoopStats::default(),
        })
    }

    /// Calibrate and prepare the sensor.
    pub fn start(&mut self) -> Result<()> {
        self.lifecycle
            .prepare(&mut self.sensor, &mut self.control)
            .map_err(eyre::Report::new)
            .wrap_err("starting sensor")
    }

    /// One measurement cycle.
    pub fn step(&mut self) -> Result<FrameStatus> {
        if self.lifecycle.state() != CalibrationState::Calibrated {
            return Err(eyre::Report::new(RangerError::State(format!(
                "sensor is {:?}, expected Calibrated",
                self.lifecycle.state()
            ))));
        }
        self.stats.frames += 1;

        self.sensor
            .measure()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("triggering measurement")?;
        self.control
            .wait_for_interrupt(self.lifecycle.interrupt_timeout())
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("waiting for frame")?;
        let report = self
            .sensor
            .read()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading frame")?;

        if report.calibration_needed {
            tracing::info!(temperature_c = report.temperature_c, "sensor requested recalibration");
            self.lifecycle.invalidate();
            self.lifecycle
                .prepare(&mut self.sensor, &mut self.control)
                .map_err(eyre::Report::new)
                .wrap_err("recalibrating sensor")?;
            self.stats.recalibrations += 1;
            return Ok(FrameStatus::Recalibrated);
        }

        let est = estimate(&report.frame, &self.range, report.temperature_c, &self.corrector);
        match est.outcome {
            EstimateOutcome::Detected => {}
            EstimateOutcome::MalformedFrame { expected, actual } => {
                tracing::warn!(expected, actual, "discarding malformed frame");
                self.stats.skipped += 1;
                return Ok(FrameStatus::Discarded { expected, actual });
            }
            other => {
                tracing::debug!(outcome = ?other, max_amplitude = est.max_amplitude, "no target");
                self.stats.skipped += 1;
                return Ok(FrameStatus::NoDetection(other));
            }
        }

        let smoothed = self.smoothing.push(est.distance_m);
        let now = self.clock.now();
        let since_last_ms = self
            .last_sent
            .map_or(0, |prev| self.clock.ms_since(prev));
        let out = RangeReport {
            distance_m: smoothed,
            frame_distance_m: est.distance_m,
            crossing_distance_m: est.crossing_distance_m,
            crossing_amplitude: est.crossing_amplitude,
            threshold: est.threshold,
            max_amplitude: est.max_amplitude,
            divisor: est.divisor,
            temperature_c: report.temperature_c,
            since_last_ms,
        };

        if let Err(e) = self.sink.send(&out) {
            let error = RangerError::Transport(e.to_string());
            tracing::warn!(error = %error, "sending range report failed");
            self.stats.send_failures += 1;
            return Ok(FrameStatus::SendFailed { report: out, error });
        }
        self.last_sent = Some(now);
        self.stats.delivered += 1;
        tracing::debug!(distance_m = out.distance_m, frame_m = out.frame_distance_m, "report sent");
        Ok(FrameStatus::Delivered(out))
    }

    /// Step until `max_frames` cycles ran or `shutdown` is raised.
    ///
    /// Starts the sensor first if it is not calibrated.
    pub fn run(&mut self, max_frames: Option<u64>, shutdown: &AtomicBool) -> Result<LoopStats> {
        if !self.lifecycle.is_ready() {
            self.start()?;
        }
        let mut done = 0u64;
        while !shutdown.load(Ordering::Relaxed) {
            if max_frames.is_some_and(|max| done >= max) {
                break;
            }
            self.step()?;
            done += 1;
        }
        tracing::info!(
            frames = self.stats.frames,
            delivered = self.stats.delivered,
            skipped = self.stats.skipped,
            "ranging loop stopped"
        );
        Ok(self.stats)
    }

    /// Latest smoothed distance, if any frame was delivered.
    pub fn smoothed(&self) -> Option<f32> {
        self.smoothing.aggregate()
    }

    pub fn state(&self) -> CalibrationState {
        self.lifecycle.state()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}
