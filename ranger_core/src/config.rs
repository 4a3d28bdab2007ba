//! Runtime configuration for the ranging pipeline.
//!
//! These are the immutable values passed by reference into the estimator and
//! the lifecycle. They are separate from the TOML schema in `ranger_config`;
//! see `conversions` for the mapping.

use ranger_traits::SensorSettings;
use std::time::Duration;

/// Sensor step length before the RF factor is applied, in metres.
pub const BASE_STEP_M: f32 = 0.0025;

/// One threshold line `threshold = slope * distance_m + y_intercept`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdLine {
    pub slope: f32,
    pub y_intercept: f32,
}

impl ThresholdLine {
    #[inline]
    pub fn at(&self, distance_m: f32) -> f32 {
        distance_m * self.slope + self.y_intercept
    }
}

/// Range geometry and the piecewise-linear detection threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeConfig {
    /// First measured point in sensor step units.
    pub start_point: i32,
    pub step_length: u16,
    pub num_points: u16,
    pub sweeps_per_frame: u16,
    /// Divides `BASE_STEP_M`; 1.0 for free-space propagation.
    pub rf_factor: f32,
    /// Segment bounds in metres: [x0, x1], (x1, x2], (x2, x3].
    pub x_intercepts: [f32; 4],
    pub lines: [ThresholdLine; 3],
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            start_point: 80,
            step_length: 1,
            num_points: 160,
            sweeps_per_frame: 1,
            rf_factor: 1.0,
            x_intercepts: [0.2, 0.3, 0.45, 0.6],
            lines: [
                ThresholdLine {
                    slope: -4000.0,
                    y_intercept: 2000.0,
                },
                ThresholdLine {
                    slope: -1000.0,
                    y_intercept: 1100.0,
                },
                ThresholdLine {
                    slope: 0.0,
                    y_intercept: 650.0,
                },
            ],
        }
    }
}

impl RangeConfig {
    /// Samples expected in one frame.
    #[inline]
    pub fn frame_len(&self) -> usize {
        usize::from(self.num_points) * usize::from(self.sweeps_per_frame)
    }

    /// Physical length of one sensor step unit in metres.
    #[inline]
    pub fn step_m(&self) -> f32 {
        BASE_STEP_M / self.rf_factor
    }

    /// Distance of range point `index` in metres.
    #[inline]
    pub fn distance_m(&self, index: usize) -> f32 {
        let step_m = self.step_m();
        (index as f32 * step_m * f32::from(self.step_length)) + (self.start_point as f32 * step_m)
    }

    /// Detection threshold at `distance_m`; 0 outside all three segments.
    pub fn threshold_at(&self, distance_m: f32) -> f32 {
        let [x0, x1, x2, x3] = self.x_intercepts;
        if distance_m >= x0 && distance_m <= x1 {
            self.lines[0].at(distance_m)
        } else if distance_m > x1 && distance_m <= x2 {
            self.lines[1].at(distance_m)
        } else if distance_m > x2 && distance_m <= x3 {
            self.lines[2].at(distance_m)
        } else {
            0.0
        }
    }
}

/// Calibrate/prepare lifecycle settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleCfg {
    /// Extra calibration attempts after the first (raised to at least 1).
    pub calibration_retries: u16,
    /// Max wait for any sensor interrupt.
    pub interrupt_timeout: Duration,
    /// Handed to the prepare primitive.
    pub sensor: SensorSettings,
}

impl Default for LifecycleCfg {
    fn default() -> Self {
        Self {
            calibration_retries: 1,
            interrupt_timeout: Duration::from_millis(1000),
            sensor: SensorSettings::default(),
        }
    }
}

/// Aggregation applied over the smoothing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingMode {
    /// Latest value only.
    Passthrough,
    /// Arithmetic mean of the window.
    Average,
    /// Weight of slot k (k = 0 oldest) is `start + k * factor`.
    Weighted { factor: f32, start: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingCfg {
    pub mode: SmoothingMode,
    pub window: usize,
}

impl Default for SmoothingCfg {
    fn default() -> Self {
        Self {
            mode: SmoothingMode::Passthrough,
            window: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_config() -> RangeConfig {
        RangeConfig {
            start_point: 0,
            step_length: 1,
            num_points: 40,
            sweeps_per_frame: 1,
            rf_factor: BASE_STEP_M,
            x_intercepts: [0.0, 10.0, 20.0, 30.0],
            lines: [
                ThresholdLine {
                    slope: 1.0,
                    y_intercept: 0.0,
                },
                ThresholdLine {
                    slope: 2.0,
                    y_intercept: 0.0,
                },
                ThresholdLine {
                    slope: 3.0,
                    y_intercept: 0.0,
                },
            ],
        }
    }

    #[test]
    fn segment_boundaries_belong_to_lower_segment() {
        let c = unit_config();
        assert_eq!(c.threshold_at(0.0), 0.0);
        assert_eq!(c.threshold_at(10.0), 10.0);
        assert_eq!(c.threshold_at(10.5), 21.0);
        assert_eq!(c.threshold_at(20.0), 40.0);
        assert_eq!(c.threshold_at(25.0), 75.0);
        assert_eq!(c.threshold_at(31.0), 0.0);
        assert_eq!(c.threshold_at(-1.0), 0.0);
    }

    #[test]
    fn distance_uses_step_and_start() {
        let c = RangeConfig {
            start_point: 100,
            step_length: 2,
            rf_factor: 1.0,
            ..RangeConfig::default()
        };
        assert!((c.distance_m(0) - 0.25).abs() < 1e-6);
        assert!((c.distance_m(10) - 0.30).abs() < 1e-6);
    }

    #[test]
    fn frame_len_multiplies_sweeps() {
        let c = RangeConfig {
            num_points: 100,
            sweeps_per_frame: 4,
            ..RangeConfig::default()
        };
        assert_eq!(c.frame_len(), 400);
    }
}
