use std::time::Duration;
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_until_with_timeout;

/// Time the sensor module needs after enable before it accepts commands.
const POWER_UP_DELAY: Duration = Duration::from_millis(2);

/// Enable and interrupt lines of the sensor module.
pub struct SensorLines {
    enable: rppal::gpio::OutputPin,
    interrupt: rppal::gpio::InputPin,
}

impl SensorLines {
    /// Claim both BCM pins; the enable line starts low.
    pub fn open(enable_pin: u8, interrupt_pin: u8) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(gpio_err)?;
        let enable = gpio.get(enable_pin).map_err(gpio_err)?.into_output_low();
        let interrupt = gpio
            .get(interrupt_pin)
            .map_err(gpio_err)?
            .into_input_pulldown();
        Ok(Self { enable, interrupt })
    }

    pub fn enable(&mut self) {
        self.enable.set_high();
        std::thread::sleep(POWER_UP_DELAY);
        trace!("sensor enabled");
    }

    pub fn disable(&mut self) {
        self.enable.set_low();
        trace!("sensor disabled");
    }

    /// Block until the interrupt line is high.
    pub fn wait_for_interrupt(&mut self, timeout: Duration) -> Result<()> {
        let interrupt = &self.interrupt;
        wait_until_with_timeout(
            || interrupt.is_high(),
            timeout,
            Duration::from_micros(200),
        )
    }
}

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_pins_are_gpio_errors() {
        // BCM numbering stops well below 200 on every board.
        assert!(matches!(SensorLines::open(200, 201), Err(HwError::Gpio(_))));
    }
}
