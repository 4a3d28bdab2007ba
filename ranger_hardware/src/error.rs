use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("sensor interrupt timeout")]
    InterruptTimeout,
    #[error("calibration error: {0}")]
    Calibration(String),
    #[error("prepare error: {0}")]
    Prepare(String),
    #[error("read error: {0}")]
    Read(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
