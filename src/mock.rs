//! Recording board for host tests.
//!
//! Every SPI write is logged together with the chip-selects that were low
//! and the level of the DC line, so tests can check framing and that two
//! panels were never selected at once. The clock only moves when a test
//! moves it, or by 1 µs per 16 bytes written to the bus.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::vec::Vec;

use embassy_time::{Duration, Instant};
use embedded_hal::digital::{ErrorType as DigitalErrorType, OutputPin};
use embedded_hal::pwm::{ErrorKind as PwmErrorKind, ErrorType as PwmErrorType, SetDutyCycle};
use embedded_hal::spi::{ErrorKind as SpiErrorKind, ErrorType as SpiErrorType, SpiBus};
use embedded_hal_async::delay::DelayNs;

use crate::board::Board;
use crate::config::{Gpio, PinConfig, PinRole};
use crate::error::BusError;
use crate::panel::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Write {
        selected: Vec<Gpio>,
        data_mode: bool,
        bytes: Vec<u8>,
    },
    /// Pixel payload after RAMWR, length only
    Pixels { selected: Vec<Gpio>, len: usize },
}

#[derive(Default)]
pub struct BusLog {
    levels: BTreeMap<Gpio, bool>,
    control: BTreeSet<Gpio>,
    events: Vec<BusEvent>,
    in_memory_write: bool,
    pixel_bytes: usize,
    first_pixels: Vec<u8>,
    /// writes with anything other than exactly one select asserted
    overlaps: usize,
}

impl BusLog {
    pub fn clear(&mut self) {
        self.events.clear();
        self.pixel_bytes = 0;
        self.first_pixels.clear();
        self.overlaps = 0;
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.events.clone()
    }

    fn selected(&self) -> Vec<Gpio> {
        self.levels
            .iter()
            .filter(|(gpio, high)| !**high && !self.control.contains(*gpio))
            .map(|(gpio, _)| *gpio)
            .collect()
    }

    fn data_mode(&self) -> bool {
        self.control
            .iter()
            .next()
            .map(|dc| self.levels.get(dc).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    fn record(&mut self, bytes: &[u8]) {
        let selected = self.selected();
        if selected.len() != 1 {
            self.overlaps += 1;
        }
        let data_mode = self.data_mode();
        if data_mode && self.in_memory_write {
            self.pixel_bytes += bytes.len();
            let room = 64usize.saturating_sub(self.first_pixels.len());
            self.first_pixels
                .extend_from_slice(&bytes[..room.min(bytes.len())]);
            let extend = matches!(
                self.events.last(),
                Some(BusEvent::Pixels { selected: s, .. }) if *s == selected
            );
            if extend {
                if let Some(BusEvent::Pixels { len, .. }) = self.events.last_mut() {
                    *len += bytes.len();
                }
            } else {
                self.events.push(BusEvent::Pixels {
                    selected,
                    len: bytes.len(),
                });
            }
            return;
        }
        if !data_mode {
            self.in_memory_write = bytes == [Command::MemoryWrite as u8];
            if self.in_memory_write {
                self.first_pixels.clear();
            }
        }
        self.events.push(BusEvent::Write {
            selected,
            data_mode,
            bytes: bytes.to_vec(),
        });
    }

    /// Number of RAMWR commands sent with only `cs` selected.
    pub fn frames_to(&self, cs: Gpio) -> usize {
        self.events
            .iter()
            .filter(|event| {
                matches!(event, BusEvent::Write { selected, data_mode: false, bytes }
                    if selected.as_slice() == [cs] && bytes.as_slice() == [Command::MemoryWrite as u8])
            })
            .count()
    }

    /// Total RAMWR commands on the bus.
    pub fn frames(&self) -> usize {
        self.events
            .iter()
            .filter(|event| {
                matches!(event, BusEvent::Write { data_mode: false, bytes, .. }
                    if bytes.as_slice() == [Command::MemoryWrite as u8])
            })
            .count()
    }

    /// Commands (DC low writes) sent to `cs`, first byte only.
    pub fn commands_to(&self, cs: Gpio) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BusEvent::Write {
                    selected,
                    data_mode: false,
                    bytes,
                } if selected.as_slice() == [cs] => bytes.first().copied(),
                _ => None,
            })
            .collect()
    }

    pub fn pixel_bytes(&self) -> usize {
        self.pixel_bytes
    }

    /// Leading bytes of the most recent pixel payload.
    pub fn first_pixel_bytes(&self, n: usize) -> Vec<u8> {
        self.first_pixels[..n].to_vec()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps
    }

    /// No chip-select is asserted.
    pub fn all_deselected(&self) -> bool {
        self.selected().is_empty()
    }
}

struct Shared {
    log: Mutex<BusLog>,
    clock_us: AtomicU64,
    fail_transfers: AtomicBool,
    claimed: Mutex<BTreeSet<Gpio>>,
    bus_claimed: AtomicBool,
    unavailable: Mutex<BTreeSet<Gpio>>,
    backlight_duty: AtomicU16,
}

/// Cloning shares the log, clock and claim bookkeeping.
#[derive(Clone)]
pub struct MockBoard {
    shared: Arc<Shared>,
}

impl MockBoard {
    /// DC and RST are taken from the default wiring so the log can tell
    /// control lines from chip-selects.
    pub fn new() -> Self {
        let defaults = PinConfig::default();
        let mut log = BusLog::default();
        // data_mode() reads the lowest control line, DC (4) sorts before RST (5)
        log.control.extend(defaults.dc);
        log.control.extend(defaults.rst);
        Self {
            shared: Arc::new(Shared {
                log: Mutex::new(log),
                clock_us: AtomicU64::new(0),
                fail_transfers: AtomicBool::new(false),
                claimed: Mutex::new(BTreeSet::new()),
                bus_claimed: AtomicBool::new(false),
                unavailable: Mutex::new(BTreeSet::new()),
                backlight_duty: AtomicU16::new(0),
            }),
        }
    }

    pub fn log(&self) -> MutexGuard<'_, BusLog> {
        self.shared.log.lock().unwrap()
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.shared.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub fn make_unavailable(&self, gpio: Gpio) {
        self.shared.unavailable.lock().unwrap().insert(gpio);
    }

    /// Bus (counted once) plus every claimed output / backlight.
    pub fn claimed_count(&self) -> usize {
        self.shared.bus_claimed.load(Ordering::SeqCst) as usize
            + self.shared.claimed.lock().unwrap().len()
    }

    pub fn backlight_duty(&self) -> u16 {
        self.shared.backlight_duty.load(Ordering::SeqCst)
    }

    pub fn advance(&self, by: Duration) {
        self.shared
            .clock_us
            .fetch_add(by.as_micros(), Ordering::SeqCst);
    }

    pub fn set_time(&self, at: Instant) {
        self.shared.clock_us.store(at.as_micros(), Ordering::SeqCst);
    }

    fn claim_pin(&self, gpio: Gpio) -> Result<(), BusError> {
        if self.shared.unavailable.lock().unwrap().contains(&gpio) {
            return Err(BusError::Unavailable(PinRole::Backlight));
        }
        if !self.shared.claimed.lock().unwrap().insert(gpio) {
            return Err(BusError::Unavailable(PinRole::Backlight));
        }
        Ok(())
    }

    fn release_pin(&self, gpio: Gpio) {
        self.shared.claimed.lock().unwrap().remove(&gpio);
    }
}

pub struct MockSpi {
    shared: Arc<Shared>,
}

impl SpiErrorType for MockSpi {
    type Error = SpiErrorKind;
}

impl SpiBus<u8> for MockSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        words.fill(0);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        if self.shared.fail_transfers.load(Ordering::SeqCst) {
            return Err(SpiErrorKind::Other);
        }
        self.shared.log.lock().unwrap().record(words);
        let cost = (words.len() as u64 / 16).max(1);
        self.shared.clock_us.fetch_add(cost, Ordering::SeqCst);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        read.fill(0);
        self.write(write)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let copy = words.to_vec();
        words.fill(0);
        self.write(&copy)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub struct MockPin {
    gpio: Gpio,
    shared: Arc<Shared>,
}

impl MockPin {
    fn set(&mut self, high: bool) {
        self.shared
            .log
            .lock()
            .unwrap()
            .levels
            .insert(self.gpio, high);
    }
}

impl DigitalErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

pub struct MockBacklight {
    shared: Arc<Shared>,
}

impl PwmErrorType for MockBacklight {
    type Error = PwmErrorKind;
}

impl SetDutyCycle for MockBacklight {
    fn max_duty_cycle(&self) -> u16 {
        100
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.shared.backlight_duty.store(duty, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Copy)]
pub struct MockDelay;

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

impl Board for MockBoard {
    type Spi = MockSpi;
    type Output = MockPin;
    type Backlight = MockBacklight;
    type Delay = MockDelay;

    fn claim_bus(&mut self, mosi: Gpio, sclk: Gpio, _frequency_hz: u32) -> Result<MockSpi, BusError> {
        let unavailable = self.shared.unavailable.lock().unwrap();
        if unavailable.contains(&mosi) || unavailable.contains(&sclk) {
            return Err(BusError::Unavailable(PinRole::Mosi));
        }
        drop(unavailable);
        if self.shared.bus_claimed.swap(true, Ordering::SeqCst) {
            return Err(BusError::Unavailable(PinRole::Mosi));
        }
        Ok(MockSpi {
            shared: self.shared.clone(),
        })
    }

    fn claim_output(&mut self, pin: Gpio, initial_high: bool) -> Result<MockPin, BusError> {
        self.claim_pin(pin)?;
        let mut output = MockPin {
            gpio: pin,
            shared: self.shared.clone(),
        };
        output.set(initial_high);
        Ok(output)
    }

    fn claim_backlight(&mut self, pin: Gpio, _active_low: bool) -> Result<MockBacklight, BusError> {
        self.claim_pin(pin)?;
        Ok(MockBacklight {
            shared: self.shared.clone(),
        })
    }

    fn release_bus(&mut self, spi: MockSpi) {
        drop(spi);
        self.shared.bus_claimed.store(false, Ordering::SeqCst);
    }

    fn release_output(&mut self, pin: Gpio, output: MockPin) {
        drop(output);
        self.shared.log.lock().unwrap().levels.remove(&pin);
        self.release_pin(pin);
    }

    fn release_backlight(&mut self, pin: Gpio, backlight: MockBacklight) {
        drop(backlight);
        self.release_pin(pin);
    }

    fn delay(&self) -> MockDelay {
        MockDelay
    }

    fn now(&self) -> Instant {
        Instant::from_micros(self.shared.clock_us.load(Ordering::SeqCst))
    }

    fn free_memory(&self) -> u32 {
        64 * 1024
    }
}
