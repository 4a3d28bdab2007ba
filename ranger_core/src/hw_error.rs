//! Maps `Box<dyn Error>` from trait boundaries to typed `RangerError`.
//!
//! The traits in `ranger_traits` box their errors so any backend fits; this
//! module converts them back, with a feature-gated path for
//! `ranger_hardware::HwError` downcasting.

use crate::error::RangerError;

/// Map a trait-boundary error to a typed `RangerError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> RangerError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<ranger_hardware::error::HwError>() {
            return match hw {
                ranger_hardware::error::HwError::InterruptTimeout => RangerError::Timeout,
                other => RangerError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        RangerError::Timeout
    } else {
        RangerError::Hardware(s)
    }
}
