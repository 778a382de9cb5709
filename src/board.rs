//! The hardware seam.
//!
//! A [`Board`] hands out the SPI bus and GPIO outputs by pin number, and
//! takes them back on teardown. Everything it returns is expressed in
//! `embedded-hal` 1.0 traits so the engine never sees a chip HAL.

use embassy_time::Instant;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::{self, ErrorKind, ErrorType, SetDutyCycle};
use embedded_hal::spi::SpiBus;
use embedded_hal_async::delay::DelayNs;

use crate::config::Gpio;
use crate::error::BusError;

pub trait Board {
    type Spi: SpiBus<u8>;
    type Output: OutputPin;
    type Backlight: SetDutyCycle;
    type Delay: DelayNs;

    /// Claim the SPI transport on the given data / clock pins.
    fn claim_bus(&mut self, mosi: Gpio, sclk: Gpio, frequency_hz: u32)
        -> Result<Self::Spi, BusError>;

    /// Claim a push-pull output, driven to `initial_high` right away.
    fn claim_output(&mut self, pin: Gpio, initial_high: bool) -> Result<Self::Output, BusError>;

    /// Claim the backlight driver.
    fn claim_backlight(&mut self, pin: Gpio, active_low: bool)
        -> Result<Self::Backlight, BusError>;

    fn release_bus(&mut self, spi: Self::Spi) {
        drop(spi);
    }

    fn release_output(&mut self, pin: Gpio, output: Self::Output) {
        let _ = pin;
        drop(output);
    }

    fn release_backlight(&mut self, pin: Gpio, backlight: Self::Backlight) {
        let _ = pin;
        drop(backlight);
    }

    fn delay(&self) -> Self::Delay;

    /// Monotonic time, used for animation timing and telemetry. The frame
    /// schedule in [`DisplayEyes::run`](crate::DisplayEyes::run) always
    /// sleeps on the embassy clock and does not read this.
    fn now(&self) -> Instant;

    /// Best effort free RAM estimate in bytes, 0 when unknown.
    fn free_memory(&self) -> u32 {
        0
    }
}

/// On/off backlight on a plain GPIO, exposed as a 0-100 duty cycle.
///
/// Any non-zero duty turns the light on.
pub struct GpioBacklight<P> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> GpioBacklight<P> {
    pub fn new(pin: P, active_low: bool) -> Self {
        Self { pin, active_low }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> ErrorType for GpioBacklight<P> {
    type Error = ErrorKind;
}

impl<P: OutputPin> SetDutyCycle for GpioBacklight<P> {
    fn max_duty_cycle(&self) -> u16 {
        100
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let high = (duty > 0) != self.active_low;
        let res = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        res.map_err(|_| pwm::ErrorKind::Other)
    }
}
