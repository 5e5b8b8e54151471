//! Illumination and sensing adapter.
//!
//! Drives the three illumination channels through `embedded-hal`
//! [`SetDutyCycle`] and reads the photodiode through the [`LightSensor`]
//! capability. Both paths are synchronous and blocking; settle delays go
//! through [`DelayNs`] so the engines stay host-testable.
//!
//! The channels are expected to be configured with a top value of
//! `DUTY_SWEEP - 1`, giving the 10-bit duty domain the engines sweep over.

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;

/// Exclusive upper bound of the duty sweep domain; valid duties are
/// `0..=DUTY_SWEEP - 1`.
pub const DUTY_SWEEP: u16 = 1024;

/// One measured (red, green, blue) sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Triplet {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl Triplet {
    pub const fn new(
        r: u16,
        g: u16,
        b: u16,
    ) -> Self {
        Self { r, g, b }
    }

    /// 8-bit form used by the catalog and the periodic reporters. The raw
    /// sensor stays at or below the 11-bit saturation threshold under
    /// calibrated illumination, so dropping three bits yields 8.
    pub fn normalized(self) -> Self {
        Self {
            r: self.r >> 3,
            g: self.g >> 3,
            b: self.b >> 3,
        }
    }

    pub fn as_tuple(self) -> (u16, u16, u16) {
        (self.r, self.g, self.b)
    }
}

/// Capability interface for the light sensor: one scalar reading,
/// proportional to received light.
pub trait LightSensor {
    type Error: core::fmt::Debug;

    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

/// Errors raised by the optics adapter.
#[derive(Debug)]
pub enum BenchError<PE, SE> {
    Pwm(PE),
    Sensor(SE),
}

/// The optical bench: three illumination channels, one sensor, one delay
/// source for settle timing.
pub struct RgbBench<P, S, D> {
    channels: [P; 3],
    sensor: S,
    delay: D,
}

impl<P, S, D> RgbBench<P, S, D>
where
    P: SetDutyCycle,
    S: LightSensor,
    D: DelayNs,
{
    pub fn new(
        red: P,
        green: P,
        blue: P,
        sensor: S,
        delay: D,
    ) -> Self {
        Self {
            channels: [red, green, blue],
            sensor,
            delay,
        }
    }

    /// Set all three channel duties at once. Duties are clamped to the
    /// sweep domain.
    pub fn set_rgb(
        &mut self,
        r: u16,
        g: u16,
        b: u16,
    ) -> Result<(), BenchError<P::Error, S::Error>> {
        for (channel, duty) in self.channels.iter_mut().zip([r, g, b]) {
            channel
                .set_duty_cycle(duty.min(DUTY_SWEEP - 1))
                .map_err(BenchError::Pwm)?;
        }
        Ok(())
    }

    /// Illuminate exactly one channel; the other two are driven to zero.
    /// Every sampling sequence uses this to avoid cross-channel optical
    /// interference.
    pub fn solo(
        &mut self,
        channel: usize,
        duty: u16,
    ) -> Result<(), BenchError<P::Error, S::Error>> {
        let mut rgb = [0u16; 3];
        rgb[channel] = duty;
        self.set_rgb(rgb[0], rgb[1], rgb[2])
    }

    pub fn all_off(&mut self) -> Result<(), BenchError<P::Error, S::Error>> {
        self.set_rgb(0, 0, 0)
    }

    /// One immediate raw intensity sample.
    pub fn read_raw(&mut self) -> Result<u16, BenchError<P::Error, S::Error>> {
        self.sensor.read_raw().map_err(BenchError::Sensor)
    }

    /// Wait for the optical path to settle, then sample once.
    pub fn settle_and_read(
        &mut self,
        settle_us: u32,
    ) -> Result<u16, BenchError<P::Error, S::Error>> {
        self.delay.delay_us(settle_us);
        self.read_raw()
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::convert::Infallible;

    struct Channel<'a>(&'a Cell<u16>);

    impl embedded_hal::pwm::ErrorType for Channel<'_> {
        type Error = Infallible;
    }

    impl SetDutyCycle for Channel<'_> {
        fn max_duty_cycle(&self) -> u16 {
            DUTY_SWEEP - 1
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
            self.0.set(duty);
            Ok(())
        }
    }

    struct FixedSensor(u16);

    impl LightSensor for FixedSensor {
        type Error = Infallible;

        fn read_raw(&mut self) -> Result<u16, Infallible> {
            Ok(self.0)
        }
    }

    #[test]
    fn solo_zeroes_the_other_channels() {
        let duties = [Cell::new(7), Cell::new(7), Cell::new(7)];
        let mut bench = RgbBench::new(
            Channel(&duties[0]),
            Channel(&duties[1]),
            Channel(&duties[2]),
            FixedSensor(0),
            embedded_hal_mock::eh1::delay::NoopDelay,
        );
        bench.solo(1, 500).unwrap();
        assert_eq!(
            [duties[0].get(), duties[1].get(), duties[2].get()],
            [0, 500, 0]
        );
    }

    #[test]
    fn duties_clamp_to_the_sweep_domain() {
        let duties = [Cell::new(0), Cell::new(0), Cell::new(0)];
        let mut bench = RgbBench::new(
            Channel(&duties[0]),
            Channel(&duties[1]),
            Channel(&duties[2]),
            FixedSensor(0),
            embedded_hal_mock::eh1::delay::NoopDelay,
        );
        bench.set_rgb(5000, 1, 2).unwrap();
        assert_eq!(duties[0].get(), DUTY_SWEEP - 1);
    }

    #[test]
    fn normalized_drops_three_bits() {
        assert_eq!(
            Triplet::new(2047, 1024, 8).normalized(),
            Triplet::new(255, 128, 1)
        );
    }
}
