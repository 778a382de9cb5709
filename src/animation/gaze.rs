//! Where the pupils point.
//!
//! Offsets are fractions of full travel, x east and y south. Without an
//! active tracking target the eyes snap to the discrete direction; with one
//! they ease toward it a bounded step per tick.

use crate::eyemodelz::{GazeDirection, GazePoint};

/// Largest pupil move per tick while tracking, as a fraction of full travel.
pub const MAX_TRACKING_STEP: f32 = 0.08;

#[derive(Debug, Clone, Copy)]
pub struct Gaze {
    direction: GazeDirection,
    target: Option<GazePoint>,
    tracking: bool,
    offset: (f32, f32),
}

impl Gaze {
    pub fn new(tracking: bool) -> Self {
        Self {
            direction: GazeDirection::StraightAhead,
            target: None,
            tracking,
            offset: (0.0, 0.0),
        }
    }

    pub fn direction(&self) -> GazeDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: GazeDirection) {
        self.direction = direction;
    }

    pub fn target(&self) -> Option<GazePoint> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<GazePoint>) {
        self.target = target;
    }

    pub fn tracking(&self) -> bool {
        self.tracking
    }

    pub fn set_tracking(&mut self, on: bool) {
        self.tracking = on;
    }

    pub fn offset(&self) -> (f32, f32) {
        self.offset
    }

    /// One tick of gaze motion.
    pub fn advance(&mut self) -> (f32, f32) {
        self.offset = match (self.tracking, self.target) {
            (true, Some(target)) => step_toward(self.offset, target.unit_offset(), MAX_TRACKING_STEP),
            _ => self.direction.unit_offset(),
        };
        self.offset
    }
}

fn step_toward(from: (f32, f32), to: (f32, f32), max_step: f32) -> (f32, f32) {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let dist = libm::sqrtf(dx * dx + dy * dy);
    if dist <= max_step {
        return to;
    }
    let scale = max_step / dist;
    (from.0 + dx * scale, from.1 + dy * scale)
}
