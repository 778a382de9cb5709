#![no_std]
#![no_main]

#[macro_use]
mod board;

use defmt::*;
use display_eyes::console::{CommandReader, Console};
use display_eyes::{DisplayEyes, EngineConfig, FrameBuffer, FrameStore, Gpio, PinConfig};
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::UART0;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::spi::{self, Spi};
use embassy_rp::uart::{self, InterruptHandler, UartRx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{with_deadline, Instant};
use static_cell::{ConstStaticCell, StaticCell};

use board::{PwmBacklight, RpBoard, BACKLIGHT_PWM, SPI_MOSI, SPI_SCLK};

use {defmt_rtt as _, panic_probe as _};

type Eyes = DisplayEyes<'static, CriticalSectionRawMutex, RpBoard>;

bind_interrupts!(struct Irqs {
    UART0_IRQ => InterruptHandler<UART0>;
});

/// Two 128x128 panels on SPI0, console on UART0 (GPIO1 rx).
const PINS: PinConfig = PinConfig {
    mosi: Some(SPI_MOSI),
    sclk: Some(SPI_SCLK),
    dc: Some(Gpio(20)),
    rst: Some(Gpio(21)),
    backlight: Some(BACKLIGHT_PWM),
    cs_left: Some(Gpio(17)),
    cs_right: Some(Gpio(16)),
};

const SPI_FREQ: u32 = 32_000_000;

// frames are too big to build on the stack
static FRAMES: ConstStaticCell<FrameStore> = ConstStaticCell::new(FrameStore::new());
static EYES: StaticCell<Eyes> = StaticCell::new();
static BARS: ConstStaticCell<FrameBuffer> = ConstStaticCell::new(FrameBuffer::new());

#[embassy_executor::task]
async fn animate(eyes: &'static Eyes) {
    eyes.run().await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    info!("Start Config");

    let mut spi_config = spi::Config::default();
    spi_config.frequency = SPI_FREQ;
    let spi = Spi::new_blocking_txonly(p.SPI0, p.PIN_18, p.PIN_19, spi_config);
    let backlight = PwmBacklight::new(Pwm::new_output_a(
        p.PWM_SLICE3,
        p.PIN_22,
        PwmConfig::default(),
    ));

    let pins = pin_bank!(p,
        2 => PIN_2, 3 => PIN_3, 4 => PIN_4, 5 => PIN_5, 6 => PIN_6, 7 => PIN_7,
        8 => PIN_8, 9 => PIN_9, 10 => PIN_10, 11 => PIN_11, 12 => PIN_12,
        13 => PIN_13, 14 => PIN_14, 15 => PIN_15, 16 => PIN_16, 17 => PIN_17,
        20 => PIN_20, 21 => PIN_21, 26 => PIN_26, 27 => PIN_27, 28 => PIN_28,
    );

    let config = EngineConfig {
        pins: PINS,
        spi_frequency_hz: SPI_FREQ,
        ..EngineConfig::default()
    };

    let eyes: &'static Eyes = EYES.init(DisplayEyes::new(
        RpBoard::new(pins, spi, backlight),
        FRAMES.take(),
    ));
    unwrap!(spawner.spawn(animate(eyes)));

    if let Err(err) = eyes.initialize(config).await {
        // the console can still fix the wiring and re-init
        error!("eyes: initialize failed: {}", err);
    }

    let mut rx = UartRx::new(p.UART0, p.PIN_1, Irqs, p.DMA_CH0, uart::Config::default());
    info!("Config done");

    let mut reader = CommandReader::new();
    let mut console = Console::new(config, BARS.take());
    let mut byte = [0u8; 1];
    loop {
        let received = match reader.deadline() {
            Some(deadline) => with_deadline(deadline, rx.read(&mut byte)).await.ok(),
            None => Some(rx.read(&mut byte).await),
        };
        let command = match received {
            Some(Ok(())) => reader.feed(byte[0], Instant::now()),
            Some(Err(err)) => {
                warn!("uart: {}", err);
                None
            }
            None => reader.poll(Instant::now()),
        };
        if let Some(command) = command {
            if let Err(err) = console.execute(eyes, command).await {
                warn!("console: {}", err);
            }
        }
    }
}
