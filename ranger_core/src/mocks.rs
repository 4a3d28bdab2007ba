//! Scripted test doubles for ranger_core

use ranger_traits::{
    BoxError, CalibrationBlob, CalibrationStep, DistanceSink, FrameReport, RadarSensor,
    RangeReport, SensorControl, SensorSettings,
};
use std::collections::VecDeque;
use std::time::Duration;

/// A sensor that replays scripted calibration results and frames.
///
/// Once the calibration script is exhausted every call returns the fallback
/// (completion with an empty blob unless changed). Reading with no frames left
/// is an error.
#[derive(Debug)]
pub struct ScriptedSensor {
    pub calibrations: VecDeque<Result<CalibrationStep, String>>,
    pub fallback_calibration: Result<CalibrationStep, String>,
    pub fail_prepare: bool,
    pub frames: VecDeque<FrameReport>,
    pub calibrate_calls: u32,
    pub prepare_calls: u32,
    pub measure_calls: u32,
    pub last_settings: Option<SensorSettings>,
}

impl Default for ScriptedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self {
            calibrations: VecDeque::new(),
            fallback_calibration: Ok(CalibrationStep::Complete(CalibrationBlob::default())),
            fail_prepare: false,
            frames: VecDeque::new(),
            calibrate_calls: 0,
            prepare_calls: 0,
            measure_calls: 0,
            last_settings: None,
        }
    }

    pub fn with_calibrations(
        mut self,
        steps: impl IntoIterator<Item = Result<CalibrationStep, String>>,
    ) -> Self {
        self.calibrations.extend(steps);
        self
    }

    pub fn with_fallback_calibration(mut self, step: Result<CalibrationStep, String>) -> Self {
        self.fallback_calibration = step;
        self
    }

    pub fn with_frames(mut self, frames: impl IntoIterator<Item = FrameReport>) -> Self {
        self.frames.extend(frames);
        self
    }
}

impl RadarSensor for ScriptedSensor {
    fn calibrate(&mut self) -> Result<CalibrationStep, BoxError> {
        self.calibrate_calls += 1;
        let next = self
            .calibrations
            .pop_front()
            .unwrap_or_else(|| self.fallback_calibration.clone());
        next.map_err(|e| Box::new(std::io::Error::other(e)) as BoxError)
    }

    fn prepare(
        &mut self,
        settings: &SensorSettings,
        _calibration: &CalibrationBlob,
    ) -> Result<(), BoxError> {
        self.prepare_calls += 1;
        self.last_settings = Some(settings.clone());
        if self.fail_prepare {
            return Err(Box::new(std::io::Error::other("prepare rejected")));
        }
        Ok(())
    }

    fn measure(&mut self) -> Result<(), BoxError> {
        self.measure_calls += 1;
        Ok(())
    }

    fn read(&mut self) -> Result<FrameReport, BoxError> {
        self.frames
            .pop_front()
            .ok_or_else(|| Box::new(std::io::Error::other("no scripted frames left")) as BoxError)
    }
}

/// Counts power and interrupt calls; optionally times out every wait.
#[derive(Debug, Default)]
pub struct ScriptedControl {
    pub enables: u32,
    pub disables: u32,
    pub waits: u32,
    pub timeout_waits: bool,
}

impl SensorControl for ScriptedControl {
    fn enable(&mut self) -> Result<(), BoxError> {
        self.enables += 1;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), BoxError> {
        self.disables += 1;
        Ok(())
    }

    fn wait_for_interrupt(&mut self, _timeout: Duration) -> Result<(), BoxError> {
        self.waits += 1;
        if self.timeout_waits {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "interrupt timeout",
            )));
        }
        Ok(())
    }
}

/// Collects delivered reports; `fail` makes every send error.
#[derive(Debug, Default)]
pub struct VecSink {
    pub reports: Vec<RangeReport>,
    pub fail: bool,
}

impl DistanceSink for VecSink {
    fn send(&mut self, report: &RangeReport) -> Result<(), BoxError> {
        if self.fail {
            return Err(Box::new(std::io::Error::other("link down")));
        }
        self.reports.push(*report);
        Ok(())
    }
}
