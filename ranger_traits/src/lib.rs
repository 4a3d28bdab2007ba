//! Hardware seams for the ranging pipeline.
//!
//! The core never talks to a sensor directly: everything it needs from the
//! outside world goes through the traits in this crate. Errors cross the
//! boundary boxed so backends can use their own error types; `ranger_core`
//! maps them back to typed errors.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use num_complex::Complex;
use std::time::Duration;

/// Boxed error used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One complex amplitude sample (real, imaginary) as produced by the sensor's
/// processing library.
pub type Sample = Complex<i16>;

/// Opaque calibration result handed from `calibrate` to `prepare`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalibrationBlob(pub Vec<u8>);

/// Result of one single-shot calibration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationStep {
    /// Not done yet; wait for the sensor interrupt and call again.
    Pending,
    /// Calibration finished and produced a blob for `prepare`.
    Complete(CalibrationBlob),
}

/// Radar front-end settings applied when the sensor is prepared for measuring.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSettings {
    pub frame_rate_hz: f32,
    pub profile: u8,
    pub receiver_gain: u8,
    pub prf: u8,
    /// Hardware accelerated average samples (1..=511).
    pub hwaas: u16,
    pub phase_enhancement: bool,
}

impl Default for SensorSettings {
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

/// Everything the frame collaborator hands over after a completed measurement.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// `num_points * sweeps_per_frame` samples, sweep-major.
    pub frame: Vec<Sample>,
    /// Sensor temperature in degrees Celsius.
    pub temperature_c: i16,
    /// The current calibration is stale for this temperature.
    pub calibration_needed: bool,
}

/// Per-frame output handed to the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeReport {
    /// Smoothed distance in metres.
    pub distance_m: f32,
    /// Corrected, unsmoothed distance of this frame in metres.
    pub frame_distance_m: f32,
    /// Distance of the first sample above threshold, in metres.
    pub crossing_distance_m: f32,
    pub crossing_amplitude: u32,
    pub threshold: f32,
    pub max_amplitude: u32,
    pub divisor: u32,
    pub temperature_c: i16,
    /// Milliseconds since the previous delivered report (0 for the first).
    pub since_last_ms: u64,
}

/// The sensor and its processing library.
pub trait RadarSensor {
    /// Run one step of the sensor self-calibration.
    fn calibrate(&mut self) -> Result<CalibrationStep, BoxError>;
    /// Load the calibration result and settings; the sensor is ready to measure afterwards.
    fn prepare(
        &mut self,
        settings: &SensorSettings,
        calibration: &CalibrationBlob,
    ) -> Result<(), BoxError>;
    /// Trigger one measurement.
    fn measure(&mut self) -> Result<(), BoxError>;
    /// Read and process the measurement triggered by `measure`.
    fn read(&mut self) -> Result<FrameReport, BoxError>;
}

/// Power and interrupt lines of the sensor.
pub trait SensorControl {
    fn enable(&mut self) -> Result<(), BoxError>;
    fn disable(&mut self) -> Result<(), BoxError>;
    /// Block until the sensor signals readiness or `timeout` expires.
    fn wait_for_interrupt(&mut self, timeout: Duration) -> Result<(), BoxError>;

    /// Disable then enable to clear analog state.
    fn power_cycle(&mut self) -> Result<(), BoxError> {
        self.disable()?;
        self.enable()
    }
}

/// Off-device transport for range reports.
pub trait DistanceSink {
    fn send(&mut self, report: &RangeReport) -> Result<(), BoxError>;
}

impl<T: DistanceSink + ?Sized> DistanceSink for &mut T {
    fn send(&mut self, report: &RangeReport) -> Result<(), BoxError> {
        (**self).send(report)
    }
}
