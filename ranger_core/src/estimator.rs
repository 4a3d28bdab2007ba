//! Threshold-crossing distance estimator.
//!
//! A single forward pass over the first sweep of a frame: the first range
//! point whose normalized power exceeds the distance-dependent threshold marks
//! the target, and the distance is refined by linear interpolation against the
//! point before it.

use crate::config::RangeConfig;
use crate::correction::DistanceCorrector;
use ranger_traits::Sample;

/// Why an estimate is (or is not) usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateOutcome {
    Detected,
    /// No point exceeded the threshold.
    NoCrossing,
    /// The very first point exceeded the threshold; nothing to interpolate against.
    CrossingAtFirstPoint,
    /// Crossing and previous point have equal amplitude.
    FlatSlope,
    /// Frame length did not match `num_points * sweeps_per_frame`.
    MalformedFrame { expected: usize, actual: usize },
}

/// Result of one `estimate` call. Distances are in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceEstimate {
    /// Corrected distance; 0 unless `outcome` is `Detected`.
    pub distance_m: f32,
    /// Interpolated distance before correction.
    pub raw_distance_m: f32,
    pub crossing_distance_m: f32,
    pub crossing_amplitude: u32,
    pub threshold: f32,
    pub divisor: u32,
    /// Peak amplitude seen up to and including the crossing.
    pub max_amplitude: u32,
    pub outcome: EstimateOutcome,
}

impl DistanceEstimate {
    fn rejected(divisor: u32, outcome: EstimateOutcome) -> Self {
        Self {
            distance_m: 0.0,
            raw_distance_m: 0.0,
            crossing_distance_m: 0.0,
            crossing_amplitude: 0,
            threshold: 0.0,
            divisor,
            max_amplitude: 0,
            outcome,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.outcome == EstimateOutcome::Detected
    }
}

/// Temperature normalization divisor: `round(-15 * t + 1600)`, at least 1.
pub fn divisor_for_temperature(temperature_c: f32) -> u32 {
    let d = (-15.0_f64 * f64::from(temperature_c) + 1600.0).round();
    // Saturating cast: NaN and negatives land on 0 and are lifted to 1.
    (d as u32).max(1)
}

/// Normalized power of one sample.
#[inline]
pub fn amplitude(sample: Sample, divisor: u32) -> u32 {
    let re = i64::from(sample.re);
    let im = i64::from(sample.im);
    let power = (re * re + im * im) as u64;
    let a = power / u64::from(divisor.max(1));
    u32::try_from(a).unwrap_or(u32::MAX)
}

/// Estimate the target distance from one frame.
pub fn estimate(
    frame: &[Sample],
    config: &RangeConfig,
    temperature_c: i16,
    corrector: &DistanceCorrector,
) -> DistanceEstimate {
    let divisor = divisor_for_temperature(f32::from(temperature_c));

    let expected = config.frame_len();
    if frame.len() != expected {
        return DistanceEstimate::rejected(
            divisor,
            EstimateOutcome::MalformedFrame {
                expected,
                actual: frame.len(),
            },
        );
    }

    let mut max_amplitude = 0u32;
    let mut below: Option<(f32, u32)> = None;
    let mut crossing: Option<(usize, f32, u32, f32)> = None;

    for (i, &sample) in frame.iter().take(usize::from(config.num_points)).enumerate() {
        let amp = amplitude(sample, divisor);
        let distance = config.distance_m(i);
        let threshold = config.threshold_at(distance);
        max_amplitude = max_amplitude.max(amp);

        if amp as f32 - threshold > 0.0 {
            crossing = Some((i, distance, amp, threshold));
            break;
        }
        below = Some((distance, amp));
    }

    let Some((index, x_cross, y_cross, threshold)) = crossing else {
        let mut est = DistanceEstimate::rejected(divisor, EstimateOutcome::NoCrossing);
        est.max_amplitude = max_amplitude;
        return est;
    };

    let mut est = DistanceEstimate {
        distance_m: 0.0,
        raw_distance_m: 0.0,
        crossing_distance_m: x_cross,
        crossing_amplitude: y_cross,
        threshold,
        divisor,
        max_amplitude,
        outcome: EstimateOutcome::Detected,
    };

    let (x_below, y_below) = match below {
        Some(p) if index > 0 => p,
        _ => {
            est.outcome = EstimateOutcome::CrossingAtFirstPoint;
            return est;
        }
    };
    if y_cross == y_below {
        est.outcome = EstimateOutcome::FlatSlope;
        return est;
    }

    let y_cross = y_cross as f32;
    let y_below = y_below as f32;
    let selected = x_below + (threshold - y_below) / (y_cross - y_below) * (x_cross - x_below);

    est.raw_distance_m = selected;
    est.distance_m = corrector.correct(selected * 1000.0) / 1000.0;
    tracing::trace!(
        index,
        raw_m = selected,
        corrected_m = est.distance_m,
        amplitude = est.crossing_amplitude,
        threshold,
        "threshold crossing"
    );
    est
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BASE_STEP_M, ThresholdLine};
    use proptest::prelude::*;

    fn unit_config(num_points: u16) -> RangeConfig {
        RangeConfig {
            start_point: 0,
            step_length: 1,
            num_points,
            sweeps_per_frame: 1,
            rf_factor: BASE_STEP_M,
            x_intercepts: [0.0, 10.0, 20.0, 30.0],
            lines: [
                ThresholdLine {
                    slope: 5.0,
                    y_intercept: 0.0,
                },
                ThresholdLine::default(),
                ThresholdLine::default(),
            ],
        }
    }

    fn re(v: i16) -> Sample {
        Sample::new(v, 0)
    }

    #[test]
    fn divisor_at_room_temperature() {
        assert_eq!(divisor_for_temperature(20.0), 1300);
        assert_eq!(divisor_for_temperature(0.0), 1600);
    }

    #[test]
    fn divisor_clamps_at_extreme_heat() {
        assert_eq!(divisor_for_temperature(200.0), 1);
        assert_eq!(divisor_for_temperature(f32::NAN), 1);
    }

    #[test]
    fn amplitude_uses_integer_division() {
        assert_eq!(amplitude(Sample::new(3, 4), 1), 25);
        assert_eq!(amplitude(Sample::new(3, 4), 2), 12);
        assert_eq!(amplitude(Sample::new(i16::MIN, i16::MIN), 1), 2_147_483_648);
    }

    #[test]
    fn crossing_at_third_point_interpolates_between_neighbours() {
        let cfg = unit_config(6);
        let frame = vec![re(0), re(0), re(100), re(1300), re(0), re(0)];
        let est = estimate(&frame, &cfg, 20, &DistanceCorrector::passthrough());
        assert_eq!(est.outcome, EstimateOutcome::Detected);
        assert_eq!(est.divisor, 1300);
        assert_eq!(est.crossing_amplitude, 1300);
        assert_eq!(est.max_amplitude, 1300);
        assert!(est.distance_m > 2.0 && est.distance_m < 3.0, "{}", est.distance_m);
    }

    #[test]
    fn crossing_at_index_zero_is_invalid() {
        let cfg = unit_config(3);
        let frame = vec![re(1000), re(0), re(0)];
        let est = estimate(&frame, &cfg, 20, &DistanceCorrector::passthrough());
        assert_eq!(est.outcome, EstimateOutcome::CrossingAtFirstPoint);
        assert!(!est.is_valid());
    }

    #[test]
    fn quiet_frame_has_no_crossing() {
        let cfg = unit_config(4);
        let est = estimate(&[re(0); 4], &cfg, 20, &DistanceCorrector::passthrough());
        assert_eq!(est.outcome, EstimateOutcome::NoCrossing);
    }

    #[test]
    fn equal_amplitudes_are_flat() {
        // Threshold below zero at index 1 so a zero-amplitude point crosses.
        let mut cfg = unit_config(3);
        cfg.lines[0] = ThresholdLine {
            slope: -1.0,
            y_intercept: 0.5,
        };
        let est = estimate(&[re(0); 3], &cfg, 20, &DistanceCorrector::passthrough());
        assert_eq!(est.outcome, EstimateOutcome::FlatSlope);
    }

    proptest! {
        #[test]
        fn divisor_is_never_zero(t in proptest::num::f32::ANY) {
            prop_assert!(divisor_for_temperature(t) >= 1);
        }

        #[test]
        fn wrong_length_is_always_malformed(len in 0usize..64) {
            let cfg = unit_config(16);
            prop_assume!(len != 16);
            let frame = vec![re(i16::MAX); len];
            let est = estimate(&frame, &cfg, 20, &DistanceCorrector::passthrough());
            prop_assert_eq!(
                est.outcome,
                EstimateOutcome::MalformedFrame { expected: 16, actual: len }
            );
            prop_assert_eq!(est.max_amplitude, 0);
        }
    }
}
