//! Blink and wink timing.
//!
//! A blink cycle runs for [`BLINK_DURATION`], lid phase following half a
//! sine: 0 open, 1 closed at the midpoint, back to 0. Manual blinks queue
//! up (a few at most) and always go before the autoblink timer, which is
//! re-armed once a blink finishes.

use core::f32::consts::PI;

use embassy_time::{Duration, Instant};

use super::rng::XorShift32;
use crate::eyemodelz::EyeState;
use crate::framebuffer::{Eye, EyeSelect};

pub const BLINK_DURATION: Duration = Duration::from_millis(180);

const AUTOBLINK_MIN_MS: u32 = 2_000;
const AUTOBLINK_MAX_MS: u32 = 6_000;

/// Extra `blink()` calls beyond this are dropped.
pub const MAX_QUEUED_BLINKS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cycle {
    start: Instant,
    eyes: EyeSelect,
}

#[derive(Debug, Clone)]
pub struct Blink {
    autoblink: bool,
    next_auto: Instant,
    queued: u8,
    wink: Option<Eye>,
    active: Option<Cycle>,
    phase: [f32; 2],
    rng: XorShift32,
}

impl Blink {
    pub fn new(seed: u32, autoblink: bool, now: Instant, state: EyeState) -> Self {
        let mut blink = Self {
            autoblink,
            next_auto: now,
            queued: 0,
            wink: None,
            active: None,
            phase: [0.0; 2],
            rng: XorShift32::new(seed),
        };
        blink.arm(now, state);
        blink
    }

    pub fn set_autoblink(&mut self, on: bool, now: Instant, state: EyeState) {
        if on && !self.autoblink {
            self.arm(now, state);
        }
        self.autoblink = on;
    }

    pub fn autoblink(&self) -> bool {
        self.autoblink
    }

    /// Queue a blink of both eyes. Returns false when the queue is full.
    pub fn request(&mut self) -> bool {
        if self.queued >= MAX_QUEUED_BLINKS {
            return false;
        }
        self.queued += 1;
        true
    }

    /// Close one eye for a cycle. A newer wink replaces a pending one.
    pub fn wink(&mut self, eye: Eye) {
        self.wink = Some(eye);
    }

    pub fn pending(&self) -> u8 {
        self.queued
    }

    /// Lid phase per eye from the last [`Blink::advance`].
    pub fn phase(&self) -> [f32; 2] {
        self.phase
    }

    pub fn next_autoblink(&self) -> Option<Instant> {
        self.autoblink.then_some(self.next_auto)
    }

    fn arm(&mut self, now: Instant, state: EyeState) {
        let ms = self.rng.range(AUTOBLINK_MIN_MS, AUTOBLINK_MAX_MS);
        let ms = ms as u64 * state.blink_interval_percent() as u64 / 100;
        self.next_auto = now + Duration::from_millis(ms);
    }

    /// Move the blink cycle to `now` and return the lid phase per eye,
    /// indexed by [`Eye::index`].
    pub fn advance(&mut self, now: Instant, state: EyeState) -> [f32; 2] {
        if let Some(cycle) = self.active {
            let elapsed = now.checked_duration_since(cycle.start).unwrap_or(Duration::from_ticks(0));
            if elapsed >= BLINK_DURATION {
                self.active = None;
                if cycle.eyes == EyeSelect::Both {
                    self.arm(now, state);
                }
            }
        }

        if self.active.is_none() {
            let eyes = if self.queued > 0 {
                self.queued -= 1;
                Some(EyeSelect::Both)
            } else if let Some(eye) = self.wink.take() {
                Some(EyeSelect::from(eye))
            } else if self.autoblink && now >= self.next_auto {
                Some(EyeSelect::Both)
            } else {
                None
            };
            self.active = eyes.map(|eyes| Cycle { start: now, eyes });
        }

        self.phase = match self.active {
            Some(cycle) => {
                let elapsed = now.checked_duration_since(cycle.start).unwrap_or(Duration::from_ticks(0));
                let t = elapsed.as_micros() as f32 / BLINK_DURATION.as_micros() as f32;
                let p = libm::sinf(PI * t.clamp(0.0, 1.0)).max(0.0);
                let mut phase = [0.0; 2];
                for eye in Eye::BOTH {
                    if cycle.eyes.contains(eye) {
                        phase[eye.index()] = p;
                    }
                }
                phase
            }
            None => [0.0; 2],
        };
        self.phase
    }
}
