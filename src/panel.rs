//! ST77xx panel protocol.
//!
//! Command codes and the power-up sequence for the 128x128 RGB565 panels.
//! Both panels share the RST and DC lines, so the hardware reset happens
//! once for the whole bus and the command sequence runs per chip-select.

use embedded_hal_async::delay::DelayNs;

use crate::board::Board;
use crate::bus::EyeBus;
use crate::error::BusError;

/// ST77xx command codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SoftwareReset = 0x01,
    SleepOut = 0x11,
    NormalDisplayOn = 0x13,
    InversionOff = 0x20,
    InversionOn = 0x21,
    DisplayOn = 0x29,
    ColumnAddressSet = 0x2A,
    RowAddressSet = 0x2B,
    MemoryWrite = 0x2C,
    MemoryAccessControl = 0x36,
    PixelFormat = 0x3A,
}

/// 16 bits per pixel, RGB565
const PIXEL_FORMAT_RGB565: u8 = 0x55;
/// Row/column order, RGB subpixel order
const MADCTL_DEFAULT: u8 = 0x00;

/// RAM offset of the visible area on the 128x128 glass
pub const COLUMN_OFFSET: u16 = 0;
pub const ROW_OFFSET: u16 = 0;

const RESET_PULSE_MS: u32 = 10;
const RESET_SETTLE_MS: u32 = 120;
const SOFTWARE_RESET_MS: u32 = 150;
const SLEEP_OUT_MS: u32 = 120;
const DISPLAY_ON_MS: u32 = 20;

pub fn inversion(on: bool) -> Command {
    if on {
        Command::InversionOn
    } else {
        Command::InversionOff
    }
}

/// Window parameters for CASET / RASET covering `len` pixels from `start`.
pub fn window(start: u16, len: u16) -> [u8; 4] {
    let end = start + len - 1;
    let [s_hi, s_lo] = start.to_be_bytes();
    let [e_hi, e_lo] = end.to_be_bytes();
    [s_hi, s_lo, e_hi, e_lo]
}

/// Reset the bus and bring every panel out of sleep with the display on.
pub async fn bring_up<B: Board, D: DelayNs>(
    bus: &mut EyeBus<B>,
    invert: bool,
    delay: &mut D,
) -> Result<(), BusError> {
    bus.set_reset(false)?;
    delay.delay_ms(RESET_PULSE_MS).await;
    bus.set_reset(true)?;
    delay.delay_ms(RESET_SETTLE_MS).await;

    for eye in bus.panels() {
        bus.command(eye, Command::SoftwareReset, &[])?;
        delay.delay_ms(SOFTWARE_RESET_MS).await;
        bus.command(eye, Command::SleepOut, &[])?;
        delay.delay_ms(SLEEP_OUT_MS).await;
        bus.command(eye, Command::PixelFormat, &[PIXEL_FORMAT_RGB565])?;
        bus.command(eye, Command::MemoryAccessControl, &[MADCTL_DEFAULT])?;
        bus.command(eye, inversion(invert), &[])?;
        bus.command(eye, Command::NormalDisplayOn, &[])?;
        bus.command(eye, Command::DisplayOn, &[])?;
        delay.delay_ms(DISPLAY_ON_MS).await;
        debug!("panel {} up", eye);
    }
    Ok(())
}

/// SLPOUT + DISPON on every panel, for panels that were put to sleep or lost power.
pub fn wake<B: Board>(bus: &mut EyeBus<B>) -> Result<(), BusError> {
    for eye in bus.panels() {
        bus.command(eye, Command::SleepOut, &[])?;
        bus.command(eye, Command::DisplayOn, &[])?;
    }
    Ok(())
}

pub fn set_inversion<B: Board>(bus: &mut EyeBus<B>, on: bool) -> Result<(), BusError> {
    for eye in bus.panels() {
        bus.command(eye, inversion(on), &[])?;
    }
    Ok(())
}
