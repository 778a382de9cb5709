//! The engine object and its control surface.
//!
//! Locking, outermost first:
//!
//! * `lifecycle`: serializes initialize / deinitialize.
//! * `animator` (async): the animation task's private state. Held for a
//!   whole tick, so taking it also means "no tick in progress".
//! * `pipeline` (async, inside [`Pipeline`]): frame slots and the bus.
//! * `shared`, `board`, `backlight` (blocking): short critical sections,
//!   never held across an await or a transfer.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_hal::pwm::SetDutyCycle;

use crate::animation::render::{render_eye, smooth_edges};
use crate::animation::{AnimationState, EyePose, FramePlan};
use crate::board::Board;
use crate::bus::EyeBus;
use crate::config::{EngineConfig, Gpio, Topology};
use crate::error::EyesError;
use crate::eyemodelz::{EyeState, GazeDirection, GazePoint};
use crate::framebuffer::{raw, Eye, EyeSelect, FrameBuffer, FrameStore};
use crate::panel;
use crate::pipeline::Pipeline;
use crate::state::{DisplayMode, ErrorReason, ModeEvent};
use crate::telemetry::{elapsed_us, FpsMeter, PerfCell, PerfSnapshot};
use crate::{EYE_DISPLAY_HEIGHT, EYE_DISPLAY_WIDTH, FRAME_PIXELS};

/// Failed tick transfers in a row before the engine gives up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// What a call to [`DisplayEyes::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// The current mode does not produce frames
    Idle,
    /// A frame was rendered and reached every panel
    Frame,
    /// The transfer failed, with the number of failures in a row
    Failed(u32),
    /// The transfer failed once too often, the engine is now in error
    Faulted,
}

/// Read-only view of the animation inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GazeSnapshot {
    pub direction: GazeDirection,
    pub target: Option<GazePoint>,
    pub tracking: bool,
    /// Pupil offset from the last tick, fractions of full travel
    pub offset: (f32, f32),
    /// Lid phase per eye from the last tick, 0 open .. 1 closed
    pub blink_phase: [f32; 2],
    pub pending_blinks: u8,
    pub autoblink: bool,
    pub eye_state: EyeState,
    pub high_quality: bool,
    pub wander: bool,
}

struct Shared {
    mode: DisplayMode,
    config: Option<EngineConfig>,
    topology: Option<Topology>,
    anim: Option<AnimationState>,
    brightness: u8,
    inverted: bool,
}

impl Shared {
    const fn new() -> Self {
        Self {
            mode: DisplayMode::Uninitialized,
            config: None,
            topology: None,
            anim: None,
            brightness: 0,
            inverted: false,
        }
    }

    fn apply(&mut self, event: ModeEvent) -> DisplayMode {
        let next = self.mode.transition(event);
        if next != self.mode {
            debug!("eyes: {} -> {}", self.mode, next);
        }
        self.mode = next;
        next
    }
}

/// State owned by the animation task between ticks.
struct Animator<'a> {
    working: &'a mut FrameBuffer,
    fps: FpsMeter,
    frames: u32,
    failures: u32,
    period: Duration,
    next: Option<Instant>,
}

impl Animator<'_> {
    fn reset(&mut self, now: Instant, period: Duration) {
        self.fps = FpsMeter::new(now);
        self.frames = 0;
        self.failures = 0;
        self.period = period;
        self.next = None;
    }
}

fn frame_period(target_fps: u8) -> Duration {
    Duration::from_micros(1_000_000 / target_fps.max(1) as u64)
}

/// Next tick deadline. Falls back to `now` when more than a full period
/// behind so a stall does not turn into a burst of catch-up ticks.
pub fn next_deadline(previous: Option<Instant>, period: Duration, now: Instant) -> Instant {
    match previous {
        None => now + period,
        Some(prev) => {
            let next = prev + period;
            if next + period <= now {
                now
            } else {
                next
            }
        }
    }
}

pub struct DisplayEyes<'a, M: RawMutex, B: Board> {
    board: BlockingMutex<M, RefCell<B>>,
    backlight: BlockingMutex<M, RefCell<Option<(Gpio, B::Backlight)>>>,
    shared: BlockingMutex<M, RefCell<Shared>>,
    animator: Mutex<M, Animator<'a>>,
    pipeline: Pipeline<'a, M, B>,
    lifecycle: Mutex<M, ()>,
    perf: PerfCell,
    started: Signal<M, ()>,
}

impl<'a, M: RawMutex, B: Board> DisplayEyes<'a, M, B> {
    /// An uninitialized engine. `store` holds every frame buffer for the
    /// engine's lifetime.
    pub fn new(board: B, store: &'a mut FrameStore) -> Self {
        let FrameStore { working, slots } = store;
        Self {
            board: BlockingMutex::new(RefCell::new(board)),
            backlight: BlockingMutex::new(RefCell::new(None)),
            shared: BlockingMutex::new(RefCell::new(Shared::new())),
            animator: Mutex::new(Animator {
                working,
                fps: FpsMeter::new(Instant::from_ticks(0)),
                frames: 0,
                failures: 0,
                period: frame_period(crate::config::DEFAULT_TARGET_FPS),
                next: None,
            }),
            pipeline: Pipeline::new(slots),
            lifecycle: Mutex::new(()),
            perf: PerfCell::new(),
            started: Signal::new(),
        }
    }

    fn now(&self) -> Instant {
        self.board.lock(|board| board.borrow().now())
    }

    fn release_bus(&self, bus: EyeBus<B>) {
        self.board.lock(|board| bus.release(&mut *board.borrow_mut()));
    }

    /// Validate `config`, claim and bring up the panels and start animating.
    ///
    /// Only valid while uninitialized; an engine in error must be
    /// deinitialized first.
    pub async fn initialize(&self, config: EngineConfig) -> Result<(), EyesError> {
        let _lifecycle = self.lifecycle.lock().await;
        let mode = self.mode();
        if mode.is_initialized() {
            return Err(EyesError::State(mode));
        }

        let topology = config.validate()?;
        let mut bus = self
            .board
            .lock(|board| EyeBus::claim(&mut *board.borrow_mut(), &config, topology))?;

        let mut delay = self.board.lock(|board| board.borrow().delay());
        if let Err(err) = panel::bring_up(&mut bus, config.invert_colors, &mut delay).await {
            error!("eyes: panel bring-up failed: {}", err);
            self.release_bus(bus);
            return Err(err.into());
        }

        let backlight = match config.pins.backlight {
            Some(pin) => {
                let claimed = self.board.lock(|board| {
                    board
                        .borrow_mut()
                        .claim_backlight(pin, config.backlight_active_low)
                });
                match claimed {
                    Ok(backlight) => Some((pin, backlight)),
                    Err(err) => {
                        self.release_bus(bus);
                        return Err(err.into());
                    }
                }
            }
            None => None,
        };

        self.pipeline.install(bus).await;
        let now = self.now();
        self.animator
            .lock()
            .await
            .reset(now, frame_period(config.target_fps));
        self.perf.reset();

        let brightness = config.backlight_percent.min(100);
        self.backlight.lock(|slot| *slot.borrow_mut() = backlight);
        self.apply_backlight(brightness);

        self.shared.lock(|shared| {
            let mut shared = shared.borrow_mut();
            shared.config = Some(config);
            shared.topology = Some(topology);
            shared.anim = Some(AnimationState::new(&config, now));
            shared.brightness = brightness;
            shared.inverted = config.invert_colors;
            shared.apply(ModeEvent::Initialized);
        });
        self.started.signal(());
        info!(
            "eyes: initialized, {} panel(s), {} fps",
            topology.panels(),
            config.target_fps
        );
        Ok(())
    }

    /// Stop animating and hand every resource back to the board.
    /// Calling it again, or on an engine never initialized, does nothing.
    pub async fn deinitialize(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let was = self.shared.lock(|shared| {
            let mut shared = shared.borrow_mut();
            let was = shared.mode;
            shared.apply(ModeEvent::Teardown);
            shared.anim = None;
            shared.config = None;
            shared.topology = None;
            was
        });
        if !was.is_initialized() {
            return;
        }

        // a tick that already read Animating finishes before the bus goes
        let _tick = self.animator.lock().await;
        if let Some(bus) = self.pipeline.teardown().await {
            self.release_bus(bus);
        }
        let backlight = self.backlight.lock(|slot| slot.borrow_mut().take());
        if let Some((pin, mut backlight)) = backlight {
            if backlight.set_duty_cycle_fully_off().is_err() {
                warn!("eyes: backlight off failed");
            }
            self.board
                .lock(|board| board.borrow_mut().release_backlight(pin, backlight));
        }
        self.perf.reset();
        self.started.reset();
        info!("eyes: deinitialized");
    }

    pub fn mode(&self) -> DisplayMode {
        self.shared.lock(|shared| shared.borrow().mode)
    }

    /// Config accepted by the last successful initialize, while initialized.
    pub fn config(&self) -> Option<EngineConfig> {
        self.shared.lock(|shared| shared.borrow().config)
    }

    pub fn topology(&self) -> Option<Topology> {
        self.shared.lock(|shared| shared.borrow().topology)
    }

    /// Pause or resume the animation. Resuming also takes down a manual
    /// image.
    pub fn set_paused(&self, paused: bool) -> Result<(), EyesError> {
        self.shared.lock(|shared| {
            let mut shared = shared.borrow_mut();
            let mode = shared.mode;
            match mode {
                DisplayMode::Uninitialized | DisplayMode::Error(_) => Err(EyesError::State(mode)),
                _ => {
                    shared.apply(if paused {
                        ModeEvent::Pause
                    } else {
                        ModeEvent::Resume
                    });
                    Ok(())
                }
            }
        })
    }

    /// Show caller supplied frames. `right` of `None` leaves the right eye
    /// as it is. The animation must be paused first.
    pub async fn submit_frame(
        &self,
        left: &[u16],
        right: Option<&[u16]>,
        width: usize,
        height: usize,
    ) -> Result<(), EyesError> {
        let fits = |frame: &[u16]| frame.len() == FRAME_PIXELS;
        if width != EYE_DISPLAY_WIDTH
            || height != EYE_DISPLAY_HEIGHT
            || !fits(left)
            || !right.map_or(true, fits)
        {
            return Err(EyesError::Dimension { width, height });
        }

        // no tick may be halfway through a transfer of its own
        let _tick = self.animator.lock().await;
        match self.mode() {
            DisplayMode::Paused | DisplayMode::ManualImage => {}
            DisplayMode::Animating => return Err(EyesError::NotPaused),
            mode => return Err(EyesError::State(mode)),
        }

        self.pipeline
            .submit(Eye::Left, |fb| fb.copy_from(left))
            .await?;
        if let Some(right) = right {
            self.pipeline
                .submit(Eye::Right, |fb| fb.copy_from(right))
                .await?;
        }
        self.shared
            .lock(|shared| shared.borrow_mut().apply(ModeEvent::ManualFrame));
        Ok(())
    }

    /// Paint the selected eyes a single color. Leaves the mode alone: pause
    /// first or the next tick paints over it.
    pub async fn fill_solid(&self, color: Rgb565, eyes: EyeSelect) -> Result<(), EyesError> {
        if self.mode() == DisplayMode::Uninitialized {
            return Err(EyesError::State(DisplayMode::Uninitialized));
        }
        let value = raw(color);
        for eye in Eye::BOTH {
            if eyes.contains(eye) {
                self.pipeline.submit(eye, |fb| fb.fill_raw(value)).await?;
            }
        }
        Ok(())
    }

    /// Run `f` on the frame the eye currently shows.
    pub async fn committed_frame<R>(&self, eye: Eye, f: impl FnOnce(&FrameBuffer) -> R) -> R {
        self.pipeline.committed(eye, f).await
    }

    /// Backlight level in percent, clamped to 0..=100. Kept even while
    /// uninitialized; initialize starts from the configured level.
    pub fn set_brightness(&self, percent: i32) {
        let percent = percent.clamp(0, 100) as u8;
        self.shared
            .lock(|shared| shared.borrow_mut().brightness = percent);
        self.apply_backlight(percent);
    }

    pub fn brightness(&self) -> u8 {
        self.shared.lock(|shared| shared.borrow().brightness)
    }

    fn apply_backlight(&self, percent: u8) {
        self.backlight.lock(|slot| {
            if let Some((_, backlight)) = slot.borrow_mut().as_mut() {
                if backlight.set_duty_cycle_percent(percent).is_err() {
                    warn!("eyes: backlight update failed");
                }
            }
        });
    }

    pub async fn set_inversion(&self, on: bool) -> Result<(), EyesError> {
        self.pipeline
            .with_bus(|bus| panel::set_inversion(bus, on))
            .await?;
        self.shared.lock(|shared| shared.borrow_mut().inverted = on);
        Ok(())
    }

    pub fn inverted(&self) -> bool {
        self.shared.lock(|shared| shared.borrow().inverted)
    }

    /// Re-send sleep-out and display-on to every panel.
    pub async fn wake(&self) -> Result<(), EyesError> {
        self.pipeline.with_bus(|bus| panel::wake(bus)).await
    }

    fn with_animation<R>(
        &self,
        f: impl FnOnce(&mut AnimationState, Instant) -> R,
    ) -> Result<R, EyesError> {
        let now = self.now();
        self.shared.lock(|shared| {
            let mut shared = shared.borrow_mut();
            match shared.anim.as_mut() {
                Some(anim) => Ok(f(anim, now)),
                None => Err(EyesError::State(DisplayMode::Uninitialized)),
            }
        })
    }

    /// Discrete gaze direction. Latched while tracking a target.
    pub fn set_direction(&self, direction: GazeDirection) -> Result<(), EyesError> {
        self.with_animation(|anim, _| anim.gaze.set_direction(direction))
    }

    pub fn set_tracking(&self, on: bool) -> Result<(), EyesError> {
        self.with_animation(|anim, _| anim.gaze.set_tracking(on))
    }

    pub fn set_tracking_target(&self, target: Option<GazePoint>) -> Result<(), EyesError> {
        self.with_animation(|anim, _| anim.gaze.set_target(target))
    }

    /// Walk the gaze around the compass on its own, blinking as it goes.
    pub fn set_wander(&self, on: bool) -> Result<(), EyesError> {
        self.with_animation(|anim, now| anim.set_wander(on, now))
    }

    pub fn set_autoblink(&self, on: bool) -> Result<(), EyesError> {
        self.with_animation(|anim, now| anim.blink.set_autoblink(on, now, anim.eye_state))
    }

    /// Queue one blink of both eyes.
    pub fn blink(&self) -> Result<(), EyesError> {
        let queued = self.with_animation(|anim, _| anim.blink.request())?;
        if !queued {
            debug!("eyes: blink queue full");
        }
        Ok(())
    }

    pub fn wink(&self, eye: Eye) -> Result<(), EyesError> {
        self.with_animation(|anim, _| anim.blink.wink(eye))
    }

    /// Resting expression.
    pub fn set_state(&self, state: EyeState) -> Result<(), EyesError> {
        self.with_animation(|anim, _| anim.eye_state = state)
    }

    pub fn set_high_quality(&self, on: bool) -> Result<(), EyesError> {
        self.with_animation(|anim, _| anim.high_quality = on)
    }

    pub fn gaze(&self) -> Result<GazeSnapshot, EyesError> {
        self.with_animation(|anim, _| GazeSnapshot {
            direction: anim.gaze.direction(),
            target: anim.gaze.target(),
            tracking: anim.gaze.tracking(),
            offset: anim.gaze.offset(),
            blink_phase: anim.blink.phase(),
            pending_blinks: anim.blink.pending(),
            autoblink: anim.blink.autoblink(),
            eye_state: anim.eye_state,
            high_quality: anim.high_quality,
            wander: anim.wander.is_some(),
        })
    }

    pub fn get_fps(&self) -> f32 {
        self.perf.fps()
    }

    pub fn get_perf(&self) -> PerfSnapshot {
        self.perf.read()
    }

    fn draw(working: &mut FrameBuffer, pose: &EyePose, high_quality: bool) {
        render_eye(working, pose);
        if high_quality {
            smooth_edges(working);
        }
    }

    /// One animation step: advance blink and gaze, render and send a frame.
    /// Does nothing unless animating.
    pub async fn tick(&self) -> TickOutcome {
        let mut guard = self.animator.lock().await;
        let animator = &mut *guard;
        let now = self.now();

        let planned = self.shared.lock(|shared| {
            let mut shared = shared.borrow_mut();
            if !shared.mode.produces_frames() {
                return None;
            }
            let topology = shared.topology?;
            let plan: FramePlan = shared.anim.as_mut()?.advance(now);
            Some((plan, topology))
        });
        let Some((plan, topology)) = planned else {
            return TickOutcome::Idle;
        };
        let fps = animator.fps.record(now);
        if let Some(step) = plan.wander_step {
            info!("eyes: wander step {}, {} fps", step, fps);
        }

        let left = plan.pose(Eye::Left);
        let right = plan.pose(Eye::Right);

        let start = self.now();
        Self::draw(animator.working, left, plan.high_quality);
        let mut render_us = elapsed_us(start, self.now());

        let start = self.now();
        let working = &*animator.working;
        let mut result = self
            .pipeline
            .submit(Eye::Left, |fb| fb.copy_from(working.pixels()))
            .await;
        let mut transfer_us = elapsed_us(start, self.now());

        if result.is_ok() && topology == Topology::Dual {
            if right != left {
                let start = self.now();
                Self::draw(animator.working, right, plan.high_quality);
                render_us += elapsed_us(start, self.now());
            }
            let start = self.now();
            let working = &*animator.working;
            result = self
                .pipeline
                .submit(Eye::Right, |fb| fb.copy_from(working.pixels()))
                .await;
            transfer_us += elapsed_us(start, self.now());
        }

        let outcome = match result {
            Ok(_) => {
                animator.failures = 0;
                animator.frames = animator.frames.wrapping_add(1);
                TickOutcome::Frame
            }
            Err(err) => {
                animator.failures += 1;
                warn!(
                    "eyes: frame transfer failed ({}/{}): {}",
                    animator.failures,
                    MAX_CONSECUTIVE_FAILURES,
                    err
                );
                if animator.failures >= MAX_CONSECUTIVE_FAILURES {
                    self.shared.lock(|shared| {
                        shared
                            .borrow_mut()
                            .apply(ModeEvent::Fault(ErrorReason::TransferFailed))
                    });
                    error!("eyes: giving up after {} failed transfers", animator.failures);
                    TickOutcome::Faulted
                } else {
                    TickOutcome::Failed(animator.failures)
                }
            }
        };

        let free_memory = self.board.lock(|board| board.borrow().free_memory());
        self.perf.publish(&PerfSnapshot {
            fps,
            render_time_us: render_us,
            transfer_time_us: transfer_us,
            free_memory,
            frames: animator.frames,
            transfer_failures: animator.failures,
        });
        outcome
    }

    /// The animation task: tick every frame period while initialized,
    /// park while uninitialized or in error. Deadlines come from the embassy
    /// clock, the same one [`Timer`] sleeps on.
    pub async fn run(&self) -> ! {
        loop {
            match self.mode() {
                DisplayMode::Uninitialized | DisplayMode::Error(_) => {
                    self.started.wait().await;
                    continue;
                }
                _ => {}
            }
            let deadline = {
                let mut animator = self.animator.lock().await;
                let deadline = next_deadline(animator.next, animator.period, Instant::now());
                animator.next = Some(deadline);
                deadline
            };
            Timer::at(deadline).await;
            self.tick().await;
        }
    }
}
