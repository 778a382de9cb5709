use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
use num_enum::TryFromPrimitive;

/// Resting expression: what the eyes show when nobody is steering them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EyeState {
    Idle, // relaxed, lids slightly lowered
    Active,
    Sleepy,
    Surprised,
}

impl EyeState {
    /// How far the lids open at rest, 0.0 closed .. 1.0 wide open
    pub fn lid_openness(&self) -> f32 {
        match self {
            EyeState::Idle => 0.85,
            EyeState::Active => 1.0,
            EyeState::Sleepy => 0.45,
            EyeState::Surprised => 1.0,
        }
    }

    /// Iris diameter scale in percent
    pub fn iris_percent(&self) -> u32 {
        match self {
            EyeState::Surprised => 80,
            _ => 100,
        }
    }

    /// Pupil diameter scale in percent
    pub fn pupil_percent(&self) -> u32 {
        match self {
            EyeState::Surprised => 60,
            EyeState::Sleepy => 120,
            _ => 100,
        }
    }

    /// Autoblink interval scale in percent (lower blinks more often)
    pub fn blink_interval_percent(&self) -> u32 {
        match self {
            EyeState::Idle => 130,
            EyeState::Active => 100,
            EyeState::Sleepy => 60,
            EyeState::Surprised => 200,
        }
    }
}

/// A 3x3 grid describing the direction the eyes are looking,
/// from the observer's perspective.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GazeDirection {
    NorthWest = 0,
    North = 1,
    NorthEast = 2,
    West = 3,
    StraightAhead = 4, // straight in front
    East = 5,
    SouthWest = 6,
    South = 7,
    SouthEast = 8,
}

impl GazeDirection {
    pub const CARDINAL_CLOCK_EDGE_ORDER: [GazeDirection; 8] = [
        GazeDirection::NorthWest,
        GazeDirection::North,
        GazeDirection::NorthEast,
        GazeDirection::East,
        GazeDirection::SouthEast,
        GazeDirection::South,
        GazeDirection::SouthWest,
        GazeDirection::West,
    ];

    /// Given a monotonically increasing counter and an arm traversal order,
    /// look out along one arm and come back to center before taking the next:
    /// even counts are StraightAhead, odd counts walk the arms in order.
    pub fn gaze_for_arm_order(counter: usize, arm_order: &[GazeDirection]) -> GazeDirection {
        if counter % 2 == 0 || arm_order.is_empty() {
            return GazeDirection::StraightAhead;
        }
        arm_order[(counter / 2) % arm_order.len()]
    }

    /// Provide the (row, column) 3x3 grid index for a gaze direction
    pub fn row_col(&self) -> (u8, u8) {
        let idx = *self as u8;
        (idx / 3, idx % 3)
    }

    /// Pupil offset for this direction as a fraction of full travel,
    /// x grows to the observer's right (east), y grows down (south).
    /// Diagonals are pulled in so they stay on the travel circle.
    pub fn unit_offset(&self) -> (f32, f32) {
        let (row, col) = self.row_col();
        let dx = col as f32 - 1.0;
        let dy = row as f32 - 1.0;
        if dx != 0.0 && dy != 0.0 {
            (dx * core::f32::consts::FRAC_1_SQRT_2, dy * core::f32::consts::FRAC_1_SQRT_2)
        } else {
            (dx, dy)
        }
    }
}

/// A continuous gaze target in percent of full travel on each axis,
/// -100 (west / north) ..= 100 (east / south).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GazePoint {
    x: i8,
    y: i8,
}

impl GazePoint {
    /// Out of range coordinates are clamped.
    pub fn new(x: i8, y: i8) -> Self {
        Self {
            x: x.clamp(-100, 100),
            y: y.clamp(-100, 100),
        }
    }

    pub fn x(&self) -> i8 {
        self.x
    }

    pub fn y(&self) -> i8 {
        self.y
    }

    pub fn unit_offset(&self) -> (f32, f32) {
        (self.x as f32 / 100.0, self.y as f32 / 100.0)
    }
}

// Precomputed fixed-point factors for common lightness adjustments (0.7 * 256, etc.)
pub const FACTOR_DARKEN_30: isize = (0.7 * 256.) as isize;
pub const FACTOR_BRIGHTEN_20: isize = (1.2 * 256.) as isize;

/// Adjust lightness of Rgb565 color by a fixed-point factor
/// factor: 256 = no change, <256 = darker, >256 = brighter
pub fn adjust_lightness_rgb565(color: Rgb565, factor: isize) -> Rgb565 {
    let r = color.r() as isize;
    let g = color.g() as isize;
    let b = color.b() as isize;

    // Scale components using fixed-point arithmetic
    let scaled_r = (r * factor) >> 8;
    let scaled_g = (g * factor) >> 8;
    let scaled_b = (b * factor) >> 8;

    // Clamp to valid channel ranges (5-6-5 bits)
    let r_final = scaled_r.clamp(0, 0x1F) as u8;
    let g_final = scaled_g.clamp(0, 0x3F) as u8;
    let b_final = scaled_b.clamp(0, 0x1F) as u8;

    Rgb565::new(r_final, g_final, b_final)
}

/// Average of two colors per channel, `weight` / 256 of `b` mixed into `a`.
pub fn blend_rgb565(a: Rgb565, b: Rgb565, weight: u16) -> Rgb565 {
    let mix = |x: u8, y: u8| -> u8 {
        let x = x as u16;
        let y = y as u16;
        ((x * (256 - weight) + y * weight) >> 8) as u8
    };
    Rgb565::new(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}
