//! Error taxonomy for the eyes engine.

use core::fmt;

use crate::config::{Gpio, PinRole};
use crate::state::DisplayMode;

/// Rejected pin / bus configuration. Caller mistake, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A mandatory pin was not assigned
    MissingPin(PinRole),
    /// Two roles were given the same GPIO
    DuplicatePin {
        first: PinRole,
        second: PinRole,
        gpio: Gpio,
    },
    /// SPI clock of 0 Hz
    InvalidFrequency,
    /// Frame rate outside the supported range
    InvalidFrameRate(u8),
}

/// Transport level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The board could not hand out the bus or a pin (in use, not wired)
    Unavailable(PinRole),
    /// SPI write failed
    Transfer,
    /// Driving a control line (CS, DC, RST, backlight) failed
    Pin,
}

/// Everything the control surface can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EyesError {
    Config(ConfigError),
    Bus(BusError),
    /// Manual frame does not match the panel resolution
    Dimension {
        width: usize,
        height: usize,
    },
    /// Manual frames need the animation paused first
    NotPaused,
    /// Operation not valid in the current mode
    State(DisplayMode),
}

impl From<ConfigError> for EyesError {
    fn from(err: ConfigError) -> Self {
        EyesError::Config(err)
    }
}

impl From<BusError> for EyesError {
    fn from(err: BusError) -> Self {
        EyesError::Bus(err)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingPin(role) => write!(f, "missing {} pin", role.name()),
            ConfigError::DuplicatePin { first, second, gpio } => write!(
                f,
                "GPIO{} assigned to both {} and {}",
                gpio.0,
                first.name(),
                second.name()
            ),
            ConfigError::InvalidFrequency => f.write_str("SPI frequency must be non-zero"),
            ConfigError::InvalidFrameRate(fps) => write!(f, "unsupported frame rate {}", fps),
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Unavailable(role) => write!(f, "{} unavailable", role.name()),
            BusError::Transfer => f.write_str("SPI transfer failed"),
            BusError::Pin => f.write_str("control line failed"),
        }
    }
}

impl fmt::Display for EyesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EyesError::Config(err) => write!(f, "config: {}", err),
            EyesError::Bus(err) => write!(f, "bus: {}", err),
            EyesError::Dimension { width, height } => write!(
                f,
                "frame is {}x{}, panel is {}x{}",
                width,
                height,
                crate::EYE_DISPLAY_WIDTH,
                crate::EYE_DISPLAY_HEIGHT
            ),
            EyesError::NotPaused => f.write_str("pause the animation before submitting frames"),
            EyesError::State(mode) => write!(f, "not allowed while {}", mode.name()),
        }
    }
}

impl core::error::Error for ConfigError {}
impl core::error::Error for BusError {}
impl core::error::Error for EyesError {}
