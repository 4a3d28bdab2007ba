use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until `is_ready` returns true (e.g. the interrupt line goes high),
/// or a timeout expires. Sleeps in small intervals to avoid CPU spinning.
pub fn wait_until_with_timeout(
    mut is_ready: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !is_ready() {
        if Instant::now() >= deadline {
            return Err(HwError::InterruptTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}
