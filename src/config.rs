//! Engine configuration: pin assignment, bus clock and initial behaviour.

use crate::error::ConfigError;

/// A GPIO number on the host MCU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Gpio(pub u8);

/// What a pin is used for. Used in errors and when claiming from the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinRole {
    Mosi,
    Sclk,
    DataCommand,
    Reset,
    Backlight,
    ChipSelectLeft,
    ChipSelectRight,
}

impl PinRole {
    pub fn name(&self) -> &'static str {
        match self {
            PinRole::Mosi => "MOSI",
            PinRole::Sclk => "SCLK",
            PinRole::DataCommand => "DC",
            PinRole::Reset => "RST",
            PinRole::Backlight => "BL",
            PinRole::ChipSelectLeft => "CS_L",
            PinRole::ChipSelectRight => "CS_R",
        }
    }
}

/// Pin assignment. `None` means "not wired".
///
/// `backlight` and `cs_right` are optional: no right chip-select selects
/// single display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    pub mosi: Option<Gpio>,
    pub sclk: Option<Gpio>,
    pub dc: Option<Gpio>,
    pub rst: Option<Gpio>,
    pub backlight: Option<Gpio>,
    pub cs_left: Option<Gpio>,
    pub cs_right: Option<Gpio>,
}

impl Default for PinConfig {
    /// The bring-up wiring: MOSI 22, SCLK 23, DC 4, RST 5, BL 6, CS 20 / 21.
    fn default() -> Self {
        Self {
            mosi: Some(Gpio(22)),
            sclk: Some(Gpio(23)),
            dc: Some(Gpio(4)),
            rst: Some(Gpio(5)),
            backlight: Some(Gpio(6)),
            cs_left: Some(Gpio(20)),
            cs_right: Some(Gpio(21)),
        }
    }
}

impl PinConfig {
    /// Every assigned pin with its role, in a fixed order.
    fn assigned(&self) -> impl Iterator<Item = (PinRole, Gpio)> {
        [
            (PinRole::Mosi, self.mosi),
            (PinRole::Sclk, self.sclk),
            (PinRole::DataCommand, self.dc),
            (PinRole::Reset, self.rst),
            (PinRole::Backlight, self.backlight),
            (PinRole::ChipSelectLeft, self.cs_left),
            (PinRole::ChipSelectRight, self.cs_right),
        ]
        .into_iter()
        .filter_map(|(role, gpio)| gpio.map(|gpio| (role, gpio)))
    }
}

/// How the two eyes map onto physical panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Topology {
    /// Left panel only
    Single,
    /// Two panels, two chip-selects
    Dual,
    /// Right chip-select equals the left one: one panel shows both eyes' (identical) output
    Mirrored,
}

impl Topology {
    /// Number of physical panels on the bus.
    pub fn panels(&self) -> usize {
        match self {
            Topology::Dual => 2,
            Topology::Single | Topology::Mirrored => 1,
        }
    }
}

pub const DEFAULT_SPI_FREQUENCY_HZ: u32 = 10_000_000;
pub const DEFAULT_TARGET_FPS: u8 = 30;
pub const MAX_TARGET_FPS: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    pub pins: PinConfig,
    pub spi_frequency_hz: u32,
    /// Initial backlight level, 0-100 (clamped)
    pub backlight_percent: u8,
    /// Backlight turns on when its line is driven low
    pub backlight_active_low: bool,
    /// Start with color inversion (INVON)
    pub invert_colors: bool,
    pub autoblink: bool,
    pub tracking: bool,
    /// Start with the unattended gaze walk running
    pub wander: bool,
    /// Start with the edge smoothing pass enabled
    pub high_quality: bool,
    /// Animation rate, 1..=60
    pub target_fps: u8,
    /// Seed for the blink interval generator
    pub seed: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pins: PinConfig::default(),
            spi_frequency_hz: DEFAULT_SPI_FREQUENCY_HZ,
            backlight_percent: 100,
            backlight_active_low: false,
            invert_colors: false,
            autoblink: true,
            tracking: false,
            wander: false,
            high_quality: false,
            target_fps: DEFAULT_TARGET_FPS,
            seed: 0x5EED_1234,
        }
    }
}

impl EngineConfig {
    /// Check the pin assignment and derive the panel topology.
    ///
    /// Mandatory: MOSI, SCLK, DC, RST and the left chip-select. All assigned
    /// pins must be distinct, with one exception: a right chip-select equal
    /// to the left one is accepted and yields [`Topology::Mirrored`].
    pub fn validate(&self) -> Result<Topology, ConfigError> {
        let pins = &self.pins;
        for (role, gpio) in [
            (PinRole::Mosi, pins.mosi),
            (PinRole::Sclk, pins.sclk),
            (PinRole::DataCommand, pins.dc),
            (PinRole::Reset, pins.rst),
            (PinRole::ChipSelectLeft, pins.cs_left),
        ] {
            if gpio.is_none() {
                return Err(ConfigError::MissingPin(role));
            }
        }

        let mirrored = pins.cs_right.is_some() && pins.cs_right == pins.cs_left;
        for (i, (first, a)) in pins.assigned().enumerate() {
            for (second, b) in pins.assigned().skip(i + 1) {
                let same_select = first == PinRole::ChipSelectLeft
                    && second == PinRole::ChipSelectRight;
                if a == b && !same_select {
                    return Err(ConfigError::DuplicatePin {
                        first,
                        second,
                        gpio: a,
                    });
                }
            }
        }

        if self.spi_frequency_hz == 0 {
            return Err(ConfigError::InvalidFrequency);
        }
        if self.target_fps == 0 || self.target_fps > MAX_TARGET_FPS {
            return Err(ConfigError::InvalidFrameRate(self.target_fps));
        }

        Ok(match pins.cs_right {
            None => Topology::Single,
            Some(_) if mirrored => Topology::Mirrored,
            Some(_) => Topology::Dual,
        })
    }
}
