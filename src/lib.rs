//! Animated dual-display robot eyes.
//!
//! Drives two RGB565 panels that share one SPI bus (separate chip-selects,
//! shared DC / RST / backlight lines) and animates a pair of procedural
//! eyes on them: blinking, looking around, easing toward a tracking target.
//!
//! ```text
//!   control surface (any task)          animation task (DisplayEyes::run)
//!            │                                   │
//!            ▼                                   ▼
//!     shared state ───── FramePlan ────▶ animation::render ──▶ working frame
//!                                                                  │
//!                                      pipeline::Pipeline  ◀── copy│
//!                                            │
//!                                        bus::EyeBus ──▶ panels
//! ```
//!
//! The crate is `no_std` and hardware agnostic: everything board specific
//! comes in through [`board::Board`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// must come first so the logging macros are visible in every module
#[macro_use]
mod fmt;

pub mod animation;
pub mod board;
pub mod bus;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod eyemodelz;
pub mod framebuffer;
pub mod panel;
pub mod pipeline;
pub mod state;
pub mod telemetry;

#[cfg(test)]
mod mock;

pub use board::{Board, GpioBacklight};
pub use config::{EngineConfig, Gpio, PinConfig, PinRole, Topology};
pub use engine::{DisplayEyes, GazeSnapshot, TickOutcome};
pub use error::{BusError, ConfigError, EyesError};
pub use eyemodelz::{EyeState, GazeDirection, GazePoint};
pub use framebuffer::{Eye, EyeSelect, FrameBuffer, FrameStore};
pub use state::{DisplayMode, ErrorReason};
pub use telemetry::PerfSnapshot;

/// Panel width in pixels. Manual frames must match it exactly.
pub const EYE_DISPLAY_WIDTH: usize = 128;
/// Panel height in pixels. Manual frames must match it exactly.
pub const EYE_DISPLAY_HEIGHT: usize = 128;
/// Pixels in one frame.
pub const FRAME_PIXELS: usize = EYE_DISPLAY_WIDTH * EYE_DISPLAY_HEIGHT;
