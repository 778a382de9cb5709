//! Bus & device layer.
//!
//! Owns the SPI bus, the shared DC and RST lines and one chip-select per
//! panel. Every method takes `&mut self`: callers share an `EyeBus` through
//! the pipeline's mutex, which is what serializes the two panels. A
//! transaction (CS low, command, parameters / pixels, flush, CS high)
//! always runs inside one lock hold.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use heapless::Vec;

use crate::board::Board;
use crate::config::{EngineConfig, Gpio, PinRole, Topology};
use crate::error::BusError;
use crate::framebuffer::Eye;
use crate::panel::{self, Command};
use crate::{EYE_DISPLAY_HEIGHT, EYE_DISPLAY_WIDTH};

/// Pixel bytes staged per SPI write.
const CHUNK_BYTES: usize = 512;

pub struct EyeBus<B: Board> {
    spi: B::Spi,
    dc: (Gpio, B::Output),
    rst: (Gpio, B::Output),
    cs_left: (Gpio, B::Output),
    /// Only present in [`Topology::Dual`]
    cs_right: Option<(Gpio, B::Output)>,
    topology: Topology,
}

/// Resources claimed so far, handed back if a later claim fails.
struct Partial<B: Board> {
    spi: Option<B::Spi>,
    outputs: Vec<(Gpio, B::Output), 4>,
}

impl<B: Board> Partial<B> {
    fn release(self, board: &mut B) {
        for (gpio, output) in self.outputs {
            board.release_output(gpio, output);
        }
        if let Some(spi) = self.spi {
            board.release_bus(spi);
        }
    }
}

fn required(pin: Option<Gpio>, role: PinRole) -> Result<Gpio, BusError> {
    pin.ok_or(BusError::Unavailable(role))
}

impl<B: Board> EyeBus<B> {
    /// Claim the bus and control lines for a validated config.
    ///
    /// On failure everything claimed so far goes back to the board.
    pub fn claim(board: &mut B, config: &EngineConfig, topology: Topology) -> Result<Self, BusError> {
        let mut partial = Partial::<B> {
            spi: None,
            outputs: Vec::new(),
        };
        if let Err(err) = Self::claim_into(board, config, topology, &mut partial) {
            warn!("bus: claim failed: {}", err);
            partial.release(board);
            return Err(err);
        }

        let mut outputs = partial.outputs.into_iter();
        match (partial.spi, outputs.next(), outputs.next(), outputs.next()) {
            (Some(spi), Some(dc), Some(rst), Some(cs_left)) => Ok(Self {
                spi,
                dc,
                rst,
                cs_left,
                cs_right: outputs.next(),
                topology,
            }),
            _ => Err(BusError::Pin),
        }
    }

    fn claim_into(
        board: &mut B,
        config: &EngineConfig,
        topology: Topology,
        partial: &mut Partial<B>,
    ) -> Result<(), BusError> {
        let pins = &config.pins;
        let mosi = required(pins.mosi, PinRole::Mosi)?;
        let sclk = required(pins.sclk, PinRole::Sclk)?;
        partial.spi = Some(board.claim_bus(mosi, sclk, config.spi_frequency_hz)?);

        // DC idles in command mode, RST released, chip-selects deasserted
        let mut wanted: Vec<(Option<Gpio>, PinRole, bool), 4> = Vec::new();
        let _ = wanted.push((pins.dc, PinRole::DataCommand, false));
        let _ = wanted.push((pins.rst, PinRole::Reset, true));
        let _ = wanted.push((pins.cs_left, PinRole::ChipSelectLeft, true));
        if topology == Topology::Dual {
            let _ = wanted.push((pins.cs_right, PinRole::ChipSelectRight, true));
        }

        for (pin, role, initial_high) in wanted {
            let gpio = required(pin, role)?;
            let output = board
                .claim_output(gpio, initial_high)
                .map_err(|_| BusError::Unavailable(role))?;
            if partial.outputs.push((gpio, output)).is_err() {
                return Err(BusError::Unavailable(role));
            }
        }
        Ok(())
    }

    /// Hand every resource back to the board.
    pub fn release(self, board: &mut B) {
        let Self {
            spi,
            dc,
            rst,
            cs_left,
            cs_right,
            ..
        } = self;
        for (gpio, output) in [Some(dc), Some(rst), Some(cs_left), cs_right]
            .into_iter()
            .flatten()
        {
            board.release_output(gpio, output);
        }
        board.release_bus(spi);
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// The physical panels on the bus, addressed by the eye they belong to.
    pub fn panels(&self) -> Vec<Eye, 2> {
        let mut panels = Vec::new();
        let _ = panels.push(Eye::Left);
        if self.cs_right.is_some() {
            let _ = panels.push(Eye::Right);
        }
        panels
    }

    /// The panel showing `eye`, or `None` when that eye has no panel of its
    /// own (single display, or mirrored onto the left panel).
    pub fn panel_for(&self, eye: Eye) -> Option<Eye> {
        match (eye, &self.cs_right) {
            (Eye::Left, _) => Some(Eye::Left),
            (Eye::Right, Some(_)) => Some(Eye::Right),
            (Eye::Right, None) => None,
        }
    }

    pub fn set_reset(&mut self, high: bool) -> Result<(), BusError> {
        let res = if high {
            self.rst.1.set_high()
        } else {
            self.rst.1.set_low()
        };
        res.map_err(|_| BusError::Pin)
    }

    /// Send one command with optional parameter bytes to a panel.
    pub fn command(&mut self, eye: Eye, cmd: Command, params: &[u8]) -> Result<(), BusError> {
        trace!("bus: cmd {=u8:#x} -> {}", cmd as u8, eye);
        self.transaction(eye, |spi, dc| {
            write_command(spi, dc, cmd)?;
            if !params.is_empty() {
                dc.set_high().map_err(|_| BusError::Pin)?;
                spi.write(params).map_err(|_| BusError::Transfer)?;
            }
            Ok(())
        })
    }

    /// Write a full frame of raw RGB565 pixels to a panel.
    pub fn write_frame(&mut self, eye: Eye, pixels: &[u16]) -> Result<(), BusError> {
        self.command(
            eye,
            Command::ColumnAddressSet,
            &panel::window(panel::COLUMN_OFFSET, EYE_DISPLAY_WIDTH as u16),
        )?;
        self.command(
            eye,
            Command::RowAddressSet,
            &panel::window(panel::ROW_OFFSET, EYE_DISPLAY_HEIGHT as u16),
        )?;
        self.transaction(eye, |spi, dc| {
            write_command(spi, dc, Command::MemoryWrite)?;
            dc.set_high().map_err(|_| BusError::Pin)?;
            let mut chunk = [0u8; CHUNK_BYTES];
            for block in pixels.chunks(CHUNK_BYTES / 2) {
                for (dst, px) in chunk.chunks_exact_mut(2).zip(block) {
                    dst.copy_from_slice(&px.to_be_bytes());
                }
                spi.write(&chunk[..block.len() * 2])
                    .map_err(|_| BusError::Transfer)?;
            }
            Ok(())
        })
    }

    /// Assert the panel's chip-select around `f`. The select is released
    /// even when `f` fails.
    fn transaction<R>(
        &mut self,
        eye: Eye,
        f: impl FnOnce(&mut B::Spi, &mut B::Output) -> Result<R, BusError>,
    ) -> Result<R, BusError> {
        let Self {
            spi,
            dc,
            cs_left,
            cs_right,
            ..
        } = self;
        let cs = match (eye, cs_right) {
            (Eye::Left, _) => &mut cs_left.1,
            (Eye::Right, Some((_, cs))) => cs,
            (Eye::Right, None) => return Err(BusError::Unavailable(PinRole::ChipSelectRight)),
        };

        cs.set_low().map_err(|_| BusError::Pin)?;
        let result = f(spi, &mut dc.1)
            .and_then(|value| spi.flush().map(|_| value).map_err(|_| BusError::Transfer));
        let released = cs.set_high().map_err(|_| BusError::Pin);
        let value = result?;
        released?;
        Ok(value)
    }
}

fn write_command<S: SpiBus<u8>, P: OutputPin>(spi: &mut S, dc: &mut P, cmd: Command) -> Result<(), BusError> {
    dc.set_low().map_err(|_| BusError::Pin)?;
    spi.write(&[cmd as u8]).map_err(|_| BusError::Transfer)
}
