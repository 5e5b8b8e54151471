//! Status LED driver.
//!
//! The on-board indicator either holds a level (`led on` / `led off`) or
//! pulses once per periodic sample when the sample flag is armed.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Width of the per-sample flash pulse.
pub const FLASH_US: u32 = 5_000;

/// Indicator LED over a plain output pin.
pub struct StatusLed<L> {
    pin: L,
}

impl<L: OutputPin> StatusLed<L> {
    pub fn new(pin: L) -> Self {
        Self { pin }
    }

    pub fn on(&mut self) -> Result<(), L::Error> {
        self.pin.set_high()
    }

    pub fn off(&mut self) -> Result<(), L::Error> {
        self.pin.set_low()
    }

    /// One short pulse, used by the periodic tick.
    pub fn flash<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<(), L::Error> {
        self.pin.set_high()?;
        delay.delay_us(FLASH_US);
        self.pin.set_low()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State, Transaction as PinTrans,
    };

    #[test]
    fn flash_pulses_high_then_low() {
        let expectations = [
            PinTrans::set(State::High),
            PinTrans::set(State::Low),
        ];
        let mut pin = PinMock::new(&expectations);
        let mut led = StatusLed::new(pin.clone());
        led.flash(&mut NoopDelay).unwrap();
        pin.done();
    }

    #[test]
    fn on_then_off() {
        let expectations = [
            PinTrans::set(State::High),
            PinTrans::set(State::Low),
        ];
        let mut pin = PinMock::new(&expectations);
        let mut led = StatusLed::new(pin.clone());
        led.on().unwrap();
        led.off().unwrap();
        pin.done();
    }
}
