pub mod error;
#[cfg(feature = "hardware")]
pub mod gpio;
pub mod util;

use error::HwError;
use ranger_traits::{
    BoxError, CalibrationBlob, CalibrationStep, FrameReport, RadarSensor, Sample, SensorControl,
    SensorSettings,
};
use std::time::Duration;

/// Range layout the simulated sensor renders frames for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimGeometry {
    pub start_point: i32,
    pub step_length: u16,
    pub num_points: u16,
    pub sweeps_per_frame: u16,
    pub rf_factor: f32,
}

impl SimGeometry {
    fn distance_m(&self, index: usize) -> f32 {
        let step_m = 0.0025 / self.rf_factor;
        (index as f32 * step_m * f32::from(self.step_length)) + (self.start_point as f32 * step_m)
    }
}

/// Simulated radar: renders a noisy leading edge at a fixed target distance.
///
/// Calibration reports `Pending` `pending_steps` times before completing.
/// Every `recalibrate_every` frames the report asks for recalibration.
pub struct SimulatedRadar {
    geometry: SimGeometry,
    target_m: f32,
    temperature_c: i16,
    fail_calibration: bool,
    pending_steps: u32,
    pending_left: u32,
    recalibrate_every: Option<u64>,
    frames_read: u64,
    measuring: bool,
    prepared: bool,
    rng: u32,
}

/// Peak real component of the echo.
const ECHO_PEAK: f32 = 20_000.0;
/// Width of the echo's rising edge in metres.
const ECHO_RAMP_M: f32 = 0.005;

impl SimulatedRadar {
    pub fn new(geometry: SimGeometry, target_m: f32) -> Self {
        Self {
            geometry,
            target_m,
            temperature_c: 25,
            fail_calibration: false,
            pending_steps: 1,
            pending_left: 1,
            recalibrate_every: None,
            frames_read: 0,
            measuring: false,
            prepared: false,
            rng: 0x2545_F491,
        }
    }

    pub fn with_temperature(mut self, temperature_c: i16) -> Self {
        self.temperature_c = temperature_c;
        self
    }

    pub fn with_failing_calibration(mut self, fail: bool) -> Self {
        self.fail_calibration = fail;
        self
    }

    pub fn with_pending_steps(mut self, steps: u32) -> Self {
        self.pending_steps = steps;
        self.pending_left = steps;
        self
    }

    pub fn with_recalibration_every(mut self, frames: u64) -> Self {
        self.recalibrate_every = (frames > 0).then_some(frames);
        self
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn noise(&mut self) -> i16 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        ((x >> 16) as i16) >> 10
    }

    fn render(&mut self) -> Vec<Sample> {
        let g = self.geometry;
        let n = usize::from(g.num_points);
        let mut frame = Vec::with_capacity(n * usize::from(g.sweeps_per_frame));
        for _ in 0..g.sweeps_per_frame {
            for i in 0..n {
                let d = g.distance_m(i);
                let rise = ((d - self.target_m) / ECHO_RAMP_M + 1.0).clamp(0.0, 1.0);
                let re = (rise * ECHO_PEAK) as i16;
                let (nr, ni) = (self.noise(), self.noise());
                frame.push(Sample::new(re.saturating_add(nr), ni));
            }
        }
        frame
    }
}

impl RadarSensor for SimulatedRadar {
    fn calibrate(&mut self) -> Result<CalibrationStep, BoxError> {
        if self.fail_calibration {
            return Err(Box::new(HwError::Calibration(
                "simulated calibration failure".into(),
            )));
        }
        if self.pending_left > 0 {
            self.pending_left -= 1;
            return Ok(CalibrationStep::Pending);
        }
        self.pending_left = self.pending_steps;
        tracing::debug!("simulated calibration complete");
        Ok(CalibrationStep::Complete(CalibrationBlob(
            self.temperature_c.to_le_bytes().to_vec(),
        )))
    }

    fn prepare(
        &mut self,
        settings: &SensorSettings,
        _calibration: &CalibrationBlob,
    ) -> Result<(), BoxError> {
        if !(1..=511).contains(&settings.hwaas) {
            return Err(Box::new(HwError::Prepare(format!(
                "hwaas {} out of range",
                settings.hwaas
            ))));
        }
        self.prepared = true;
        Ok(())
    }

    fn measure(&mut self) -> Result<(), BoxError> {
        if !self.prepared {
            return Err(Box::new(HwError::Read("sensor not prepared".into())));
        }
        self.measuring = true;
        Ok(())
    }

    fn read(&mut self) -> Result<FrameReport, BoxError> {
        if !std::mem::take(&mut self.measuring) {
            return Err(Box::new(HwError::Read("no measurement pending".into())));
        }
        self.frames_read += 1;
        let calibration_needed = self
            .recalibrate_every
            .is_some_and(|n| self.frames_read % n == 0);
        if calibration_needed {
            self.prepared = false;
        }
        Ok(FrameReport {
            frame: self.render(),
            temperature_c: self.temperature_c,
            calibration_needed,
        })
    }
}

/// Simulated power and interrupt lines.
///
/// The interrupt fires after `frame_period` (immediately by default), unless
/// `never_interrupt` is set, in which case every wait runs into its timeout.
#[derive(Debug, Default)]
pub struct SimulatedControl {
    enabled: bool,
    never_interrupt: bool,
    frame_period: Duration,
    power_cycles: u32,
}

impl SimulatedControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_never_interrupt(mut self, never: bool) -> Self {
        self.never_interrupt = never;
        self
    }

    /// Pace interrupts like a sensor running at a fixed frame rate.
    pub fn with_frame_period(mut self, period: Duration) -> Self {
        self.frame_period = period;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of disable→enable transitions seen.
    pub fn power_cycles(&self) -> u32 {
        self.power_cycles
    }
}

impl SensorControl for SimulatedControl {
    fn enable(&mut self) -> Result<(), BoxError> {
        if !self.enabled {
            self.power_cycles += 1;
        }
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), BoxError> {
        self.enabled = false;
        Ok(())
    }

    fn wait_for_interrupt(&mut self, timeout: Duration) -> Result<(), BoxError> {
        if !self.enabled {
            return Err(Box::new(HwError::Gpio("sensor is disabled".into())));
        }
        if self.never_interrupt {
            util::wait_until_with_timeout(|| false, timeout, Duration::from_millis(1))?;
        } else if !self.frame_period.is_zero() {
            std::thread::sleep(self.frame_period.min(timeout));
        }
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub mod hardware {
    use crate::error::HwError;
    use crate::gpio::SensorLines;
    use ranger_traits::{BoxError, SensorControl};
    use std::time::Duration;

    /// Sensor power/interrupt control over Raspberry Pi GPIO.
    pub struct GpioControl {
        lines: SensorLines,
    }

    impl GpioControl {
        pub fn try_new(enable_pin: u8, interrupt_pin: u8) -> Result<Self, HwError> {
            Ok(Self {
                lines: SensorLines::open(enable_pin, interrupt_pin)?,
            })
        }
    }

    impl SensorControl for GpioControl {
        fn enable(&mut self) -> Result<(), BoxError> {
            self.lines.enable();
            Ok(())
        }

        fn disable(&mut self) -> Result<(), BoxError> {
            self.lines.disable();
            Ok(())
        }

        fn wait_for_interrupt(&mut self, timeout: Duration) -> Result<(), BoxError> {
            self.lines.wait_for_interrupt(timeout).map_err(|e| {
                tracing::warn!(error = %e, "sensor interrupt wait failed");
                Box::new(e) as BoxError
            })
        }
    }
}
