use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RangerError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("timeout waiting for sensor interrupt")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
    #[error("sensor calibration failed after {attempts} attempt(s): {reason}")]
    CalibrationFailed { attempts: u32, reason: String },
    #[error("sensor prepare failed: {0}")]
    PrepareFailed(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
