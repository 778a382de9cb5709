//! Procedural animation: blink timing, gaze motion and the per-eye pose
//! they produce for the rasterizer.

pub mod blink;
pub mod gaze;
pub mod render;
pub mod rng;

use embassy_time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::eyemodelz::{EyeState, GazeDirection};
use crate::framebuffer::Eye;

pub use blink::Blink;
pub use gaze::Gaze;
pub use render::EyePose;

/// Time spent on each step of the wander walk.
pub const WANDER_STEP: Duration = Duration::from_millis(1_500);

/// Unattended gaze walk: out along one arm of the compass and back to
/// center every [`WANDER_STEP`], with a blink on every third step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wander {
    step: usize,
    next: Instant,
}

impl Wander {
    pub fn new(now: Instant) -> Self {
        Self { step: 0, next: now }
    }

    pub fn step(&self) -> usize {
        self.step
    }
}

/// Animation inputs shared with the control surface.
///
/// Lives in the engine's state mutex; a tick advances it and copies out a
/// [`FramePlan`] before any drawing happens.
#[derive(Debug, Clone)]
pub struct AnimationState {
    pub blink: Blink,
    pub gaze: Gaze,
    pub eye_state: EyeState,
    pub high_quality: bool,
    pub wander: Option<Wander>,
}

/// What to draw this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub poses: [EyePose; 2],
    pub high_quality: bool,
    /// Set when this tick moved the wander walk on
    pub wander_step: Option<usize>,
}

impl FramePlan {
    pub fn pose(&self, eye: Eye) -> &EyePose {
        &self.poses[eye.index()]
    }
}

impl AnimationState {
    pub fn new(config: &EngineConfig, now: Instant) -> Self {
        let eye_state = EyeState::Active;
        Self {
            blink: Blink::new(config.seed, config.autoblink, now, eye_state),
            gaze: Gaze::new(config.tracking),
            eye_state,
            high_quality: config.high_quality,
            wander: config.wander.then(|| Wander::new(now)),
        }
    }

    pub fn set_wander(&mut self, on: bool, now: Instant) {
        match (on, self.wander.is_some()) {
            (true, false) => self.wander = Some(Wander::new(now)),
            (false, true) => {
                self.wander = None;
                self.gaze.set_direction(GazeDirection::StraightAhead);
            }
            _ => {}
        }
    }

    fn step_wander(&mut self, now: Instant) -> Option<usize> {
        let wander = self.wander.as_mut()?;
        if now < wander.next {
            return None;
        }
        let step = wander.step;
        self.gaze.set_direction(GazeDirection::gaze_for_arm_order(
            step,
            &GazeDirection::CARDINAL_CLOCK_EDGE_ORDER,
        ));
        if step % 3 == 0 {
            self.blink.request();
        }
        wander.step = step.wrapping_add(1);
        wander.next = now + WANDER_STEP;
        Some(step)
    }

    /// Step wander, blink and gaze to `now`.
    pub fn advance(&mut self, now: Instant) -> FramePlan {
        let wander_step = self.step_wander(now);
        let phase = self.blink.advance(now, self.eye_state);
        let offset = self.gaze.advance();
        let rest = self.eye_state.lid_openness();
        let pose = |phase: f32| EyePose {
            offset,
            openness: rest * (1.0 - phase),
            iris_percent: self.eye_state.iris_percent(),
            pupil_percent: self.eye_state.pupil_percent(),
        };
        FramePlan {
            poses: [pose(phase[Eye::Left.index()]), pose(phase[Eye::Right.index()])],
            high_quality: self.high_quality,
            wander_step,
        }
    }
}
