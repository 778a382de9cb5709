//! RP2040 implementation of the engine's hardware seam.
//!
//! GPIOs live in a bank indexed by pin number so the engine can claim them
//! from a runtime [`EngineConfig`](display_eyes::EngineConfig) and hand them
//! back on teardown. The SPI block is bound to its pins up front: the RP2040
//! only routes SPI0 to fixed pads, so any other MOSI / SCLK pair is refused.
//! The backlight gets real dimming on [`BACKLIGHT_PWM`]; any other backlight
//! pin falls back to on / off.

use display_eyes::{Board, BusError, Gpio, GpioBacklight, PinRole};
use embassy_rp::gpio::{Flex, Level};
use embassy_rp::peripherals::SPI0;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::spi::{Blocking, Spi};
use embassy_time::{Delay, Instant};
use embedded_hal::pwm::{ErrorKind, ErrorType, SetDutyCycle};

pub const GPIO_COUNT: usize = 30;

/// SPI0 data pad.
pub const SPI_MOSI: Gpio = Gpio(19);
/// SPI0 clock pad.
pub const SPI_SCLK: Gpio = Gpio(18);
/// Backlight pad wired to PWM slice 3, channel A.
pub const BACKLIGHT_PWM: Gpio = Gpio(22);

/// PWM wrap: 125 MHz / 5000 = 25 kHz, above audible whine.
const PWM_TOP: u16 = 4_999;

pub type PinBank = [Option<Flex<'static>>; GPIO_COUNT];

/// Move the listed pins into a bank, e.g. `pin_bank!(p, 2 => PIN_2, 3 => PIN_3)`.
macro_rules! pin_bank {
    ($p:ident, $($n:literal => $pin:ident),* $(,)?) => {{
        let mut bank: $crate::board::PinBank = [const { None }; $crate::board::GPIO_COUNT];
        $( bank[$n] = Some(embassy_rp::gpio::Flex::new($p.$pin)); )*
        bank
    }};
}

/// Dimmable backlight on one PWM channel.
pub struct PwmBacklight {
    pwm: Pwm<'static>,
    config: PwmConfig,
}

impl PwmBacklight {
    pub fn new(pwm: Pwm<'static>) -> Self {
        let mut config = PwmConfig::default();
        config.top = PWM_TOP;
        config.compare_a = 0;
        let mut backlight = Self { pwm, config };
        backlight.pwm.set_config(&backlight.config);
        backlight
    }

    /// Switch polarity and go dark.
    fn set_active_low(&mut self, active_low: bool) {
        self.config.invert_a = active_low;
        self.config.compare_a = 0;
        self.pwm.set_config(&self.config);
    }
}

impl ErrorType for PwmBacklight {
    type Error = ErrorKind;
}

impl SetDutyCycle for PwmBacklight {
    fn max_duty_cycle(&self) -> u16 {
        // compare above top keeps the output on for the whole period
        PWM_TOP + 1
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.config.compare_a = duty.min(PWM_TOP + 1);
        self.pwm.set_config(&self.config);
        Ok(())
    }
}

pub enum RpBacklight {
    Pwm(PwmBacklight),
    Gpio(GpioBacklight<Flex<'static>>),
}

impl ErrorType for RpBacklight {
    type Error = ErrorKind;
}

impl SetDutyCycle for RpBacklight {
    fn max_duty_cycle(&self) -> u16 {
        match self {
            RpBacklight::Pwm(pwm) => pwm.max_duty_cycle(),
            RpBacklight::Gpio(gpio) => gpio.max_duty_cycle(),
        }
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        match self {
            RpBacklight::Pwm(pwm) => pwm.set_duty_cycle(duty),
            RpBacklight::Gpio(gpio) => gpio.set_duty_cycle(duty),
        }
    }
}

pub struct RpBoard {
    pins: PinBank,
    spi: Option<Spi<'static, SPI0, Blocking>>,
    backlight_pwm: Option<PwmBacklight>,
}

impl RpBoard {
    pub fn new(
        pins: PinBank,
        spi: Spi<'static, SPI0, Blocking>,
        backlight_pwm: PwmBacklight,
    ) -> Self {
        Self {
            pins,
            spi: Some(spi),
            backlight_pwm: Some(backlight_pwm),
        }
    }

    fn take(&mut self, pin: Gpio, role: PinRole) -> Result<Flex<'static>, BusError> {
        self.pins
            .get_mut(pin.0 as usize)
            .and_then(Option::take)
            .ok_or(BusError::Unavailable(role))
    }

    fn put_back(&mut self, pin: Gpio, mut flex: Flex<'static>) {
        flex.set_as_input();
        if let Some(slot) = self.pins.get_mut(pin.0 as usize) {
            *slot = Some(flex);
        }
    }
}

impl Board for RpBoard {
    type Spi = Spi<'static, SPI0, Blocking>;
    type Output = Flex<'static>;
    type Backlight = RpBacklight;
    type Delay = Delay;

    fn claim_bus(
        &mut self,
        mosi: Gpio,
        sclk: Gpio,
        frequency_hz: u32,
    ) -> Result<Self::Spi, BusError> {
        if mosi != SPI_MOSI {
            return Err(BusError::Unavailable(PinRole::Mosi));
        }
        if sclk != SPI_SCLK {
            return Err(BusError::Unavailable(PinRole::Sclk));
        }
        let mut spi = self.spi.take().ok_or(BusError::Unavailable(PinRole::Mosi))?;
        spi.set_frequency(frequency_hz);
        Ok(spi)
    }

    fn claim_output(&mut self, pin: Gpio, initial_high: bool) -> Result<Self::Output, BusError> {
        // the bus reports the real role
        let mut flex = self.take(pin, PinRole::DataCommand)?;
        flex.set_level(if initial_high { Level::High } else { Level::Low });
        flex.set_as_output();
        Ok(flex)
    }

    fn claim_backlight(
        &mut self,
        pin: Gpio,
        active_low: bool,
    ) -> Result<Self::Backlight, BusError> {
        // dark until the engine sets a level
        if pin == BACKLIGHT_PWM {
            let mut pwm = self
                .backlight_pwm
                .take()
                .ok_or(BusError::Unavailable(PinRole::Backlight))?;
            pwm.set_active_low(active_low);
            return Ok(RpBacklight::Pwm(pwm));
        }
        let mut flex = self.take(pin, PinRole::Backlight)?;
        flex.set_level(if active_low { Level::High } else { Level::Low });
        flex.set_as_output();
        Ok(RpBacklight::Gpio(GpioBacklight::new(flex, active_low)))
    }

    fn release_bus(&mut self, spi: Self::Spi) {
        self.spi = Some(spi);
    }

    fn release_output(&mut self, pin: Gpio, output: Self::Output) {
        self.put_back(pin, output);
    }

    fn release_backlight(&mut self, pin: Gpio, backlight: Self::Backlight) {
        match backlight {
            RpBacklight::Pwm(pwm) => self.backlight_pwm = Some(pwm),
            RpBacklight::Gpio(gpio) => self.put_back(pin, gpio.into_inner()),
        }
    }

    fn delay(&self) -> Self::Delay {
        Delay
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    /// RAM between the end of the statics and the stack pointer. There is no
    /// heap, so this is what the stack can still grow into.
    fn free_memory(&self) -> u32 {
        extern "C" {
            static __sheap: u8;
        }
        // SAFETY: only the address of the linker symbol is taken
        let statics_end = unsafe { core::ptr::addr_of!(__sheap) } as u32;
        cortex_m::register::msp::read().saturating_sub(statics_end)
    }
}
