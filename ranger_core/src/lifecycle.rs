//! Sensor calibrate/prepare lifecycle.
//!
//! The retry policy is plain data; the side effects (power cycling, waiting
//! for the interrupt line, the calibrate and prepare primitives) go through
//! `SensorControl` and `RadarSensor` so the state machine can be driven by
//! scripted fakes in tests.

use crate::config::LifecycleCfg;
use crate::error::RangerError;
use crate::hw_error::map_hw_error;
use ranger_traits::{CalibrationBlob, CalibrationStep, RadarSensor, SensorControl, SensorSettings};
use std::time::Duration;

/// Upper bound on `Pending` results within one calibration attempt.
pub const MAX_PENDING_STEPS: u32 = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CalibrationState {
    #[default]
    Uncalibrated,
    Calibrating,
    /// Calibrated and prepared; frames may be measured.
    Calibrated,
    /// Last lifecycle run failed. Only a fresh `prepare` leaves this state.
    PrepareFailed,
}

/// Bounded retry policy for calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u16,
}

impl RetryPolicy {
    /// At least one retry is always allowed.
    pub fn new(retries: u16) -> Self {
        Self {
            retries: retries.max(1),
        }
    }

    pub fn retries(&self) -> u16 {
        self.retries
    }

    pub fn max_attempts(&self) -> u32 {
        u32::from(self.retries) + 1
    }
}

#[derive(Debug)]
pub struct SensorLifecycle {
    state: CalibrationState,
    policy: RetryPolicy,
    interrupt_timeout: Duration,
    settings: SensorSettings,
    last_attempts: u32,
}

impl SensorLifecycle {
    pub fn new(cfg: &LifecycleCfg) -> Self {
        Self {
            state: CalibrationState::Uncalibrated,
            policy: RetryPolicy::new(cfg.calibration_retries),
            interrupt_timeout: cfg.interrupt_timeout,
            settings: cfg.sensor.clone(),
            last_attempts: 0,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == CalibrationState::Calibrated
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Calibration attempts used by the most recent `prepare`.
    pub fn attempts(&self) -> u32 {
        self.last_attempts
    }

    pub fn interrupt_timeout(&self) -> Duration {
        self.interrupt_timeout
    }

    /// Drop the current calibration, e.g. on temperature drift.
    pub fn invalidate(&mut self) {
        self.state = CalibrationState::Uncalibrated;
    }

    /// Calibrate with retries, power-cycle, then prepare the sensor.
    ///
    /// Any previous state is discarded. On error the state is
    /// `PrepareFailed` and the caller must start over with another `prepare`.
    pub fn prepare<S, C>(&mut self, sensor: &mut S, control: &mut C) -> Result<(), RangerError>
    where
        S: RadarSensor + ?Sized,
        C: SensorControl + ?Sized,
    {
        self.state = CalibrationState::Calibrating;
        self.last_attempts = 0;
        let max_attempts = self.policy.max_attempts();

        let mut blob = None;
        let mut last_err = String::new();
        for attempt in 1..=max_attempts {
            self.last_attempts = attempt;
            match self.calibrate_once(sensor, control) {
                Ok(b) => {
                    blob = Some(b);
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt, max_attempts, error = %e, "sensor calibration attempt failed");
                    last_err = e.to_string();
                }
            }
        }

        let Some(blob) = blob else {
            self.state = CalibrationState::PrepareFailed;
            tracing::error!(attempts = max_attempts, "sensor calibration failed");
            return Err(RangerError::CalibrationFailed {
                attempts: max_attempts,
                reason: last_err,
            });
        };

        let prepared = control
            .power_cycle()
            .map_err(|e| map_hw_error(&*e))
            .and_then(|()| {
                sensor
                    .prepare(&self.settings, &blob)
                    .map_err(|e| RangerError::PrepareFailed(e.to_string()))
            });
        if let Err(e) = prepared {
            self.state = CalibrationState::PrepareFailed;
            tracing::error!(error = %e, "sensor prepare failed");
            return Err(match e {
                RangerError::PrepareFailed(_) => e,
                other => RangerError::PrepareFailed(other.to_string()),
            });
        }

        self.state = CalibrationState::Calibrated;
        tracing::info!(attempts = self.last_attempts, "sensor calibrated and prepared");
        Ok(())
    }

    fn calibrate_once<S, C>(
        &self,
        sensor: &mut S,
        control: &mut C,
    ) -> Result<CalibrationBlob, RangerError>
    where
        S: RadarSensor + ?Sized,
        C: SensorControl + ?Sized,
    {
        control.power_cycle().map_err(|e| map_hw_error(&*e))?;
        for _ in 0..MAX_PENDING_STEPS {
            match sensor.calibrate().map_err(|e| map_hw_error(&*e))? {
                CalibrationStep::Complete(blob) => return Ok(blob),
                CalibrationStep::Pending => control
                    .wait_for_interrupt(self.interrupt_timeout)
                    .map_err(|e| map_hw_error(&*e))?,
            }
        }
        Err(RangerError::Hardware(format!(
            "calibration still pending after {MAX_PENDING_STEPS} steps"
        )))
    }
}
