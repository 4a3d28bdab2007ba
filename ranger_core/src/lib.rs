#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core ranging logic (hardware-agnostic).
//!
//! All hardware interactions go through the `ranger_traits::RadarSensor`,
//! `ranger_traits::SensorControl` and `ranger_traits::DistanceSink` traits.
//!
//! ## Architecture
//!
//! - **Lifecycle**: bounded calibrate/prepare retry loop (`lifecycle`)
//! - **Estimator**: first threshold crossing plus linear interpolation (`estimator`)
//! - **Correction**: empirical lookup and error tables (`correction`)
//! - **Smoothing**: fixed window passthrough/mean/weighted mean (`smoothing`)
//! - **Loop**: measure, estimate, correct, smooth, send (`runner`)
//!
//! Configuration is immutable after start-up and passed by reference; the
//! lifecycle state and smoothing window are owned by the loop.

pub mod config;
pub mod conversions;
pub mod correction;
pub mod error;
pub mod estimator;
pub mod hw_error;
pub mod lifecycle;
pub mod mocks;
pub mod runner;
pub mod smoothing;
pub mod status;

pub use config::{BASE_STEP_M, LifecycleCfg, RangeConfig, SmoothingCfg, SmoothingMode, ThresholdLine};
pub use correction::{
    CorrectionTable, DEFAULT_TOLERANCE_MM, DistanceCorrector, ErrorCorrectionTable, TableError,
};
pub use error::{BuildError, RangerError, Result};
pub use estimator::{DistanceEstimate, EstimateOutcome, divisor_for_temperature, estimate};
pub use lifecycle::{CalibrationState, RetryPolicy, SensorLifecycle};
pub use runner::{LoopStats, RangingLoop, RunParams};
pub use smoothing::SmoothingBuffer;
pub use status::FrameStatus;
