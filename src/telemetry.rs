//! Performance telemetry.
//!
//! The animation task is the only writer. Readers on any task get a
//! consistent [`PerfSnapshot`] without taking a lock: the cell holds two
//! slots of plain atomics, each guarded by its own sequence counter. The
//! writer fills the slot readers are not pointed at and then flips the
//! index, so a reader that interrupts a half-finished publish still finds
//! a complete slot.

use embassy_time::{Duration, Instant};
use portable_atomic::{fence, AtomicU32, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PerfSnapshot {
    /// Moving average of the animation rate
    pub fps: f32,
    /// Rasterization time of the last frame
    pub render_time_us: u32,
    /// Bus time of the last frame, both panels
    pub transfer_time_us: u32,
    /// Board's free RAM estimate in bytes, 0 when unknown
    pub free_memory: u32,
    /// Frames produced since initialization
    pub frames: u32,
    /// Failed transfers in a row
    pub transfer_failures: u32,
}

struct Slot {
    /// Odd while the writer is inside this slot
    seq: AtomicU32,
    fps_bits: AtomicU32,
    render_us: AtomicU32,
    transfer_us: AtomicU32,
    free_memory: AtomicU32,
    frames: AtomicU32,
    failures: AtomicU32,
}

impl Slot {
    const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            fps_bits: AtomicU32::new(0),
            render_us: AtomicU32::new(0),
            transfer_us: AtomicU32::new(0),
            free_memory: AtomicU32::new(0),
            frames: AtomicU32::new(0),
            failures: AtomicU32::new(0),
        }
    }

    fn write(&self, snap: &PerfSnapshot) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.fps_bits.store(snap.fps.to_bits(), Ordering::Relaxed);
        self.render_us.store(snap.render_time_us, Ordering::Relaxed);
        self.transfer_us.store(snap.transfer_time_us, Ordering::Relaxed);
        self.free_memory.store(snap.free_memory, Ordering::Relaxed);
        self.frames.store(snap.frames, Ordering::Relaxed);
        self.failures.store(snap.transfer_failures, Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// `None` if the writer was inside the slot at any point of the copy.
    fn try_read(&self) -> Option<PerfSnapshot> {
        let before = self.seq.load(Ordering::Acquire);
        if before % 2 == 1 {
            return None;
        }
        let snap = PerfSnapshot {
            fps: f32::from_bits(self.fps_bits.load(Ordering::Relaxed)),
            render_time_us: self.render_us.load(Ordering::Relaxed),
            transfer_time_us: self.transfer_us.load(Ordering::Relaxed),
            free_memory: self.free_memory.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            transfer_failures: self.failures.load(Ordering::Relaxed),
        };
        fence(Ordering::Acquire);
        (self.seq.load(Ordering::Relaxed) == before).then_some(snap)
    }
}

pub struct PerfCell {
    /// Slot holding the latest complete snapshot
    latest: AtomicUsize,
    slots: [Slot; 2],
}

impl PerfCell {
    pub const fn new() -> Self {
        Self {
            latest: AtomicUsize::new(0),
            slots: [Slot::new(), Slot::new()],
        }
    }

    /// Single writer only.
    pub fn publish(&self, snap: &PerfSnapshot) {
        let next = self.latest.load(Ordering::Relaxed) ^ 1;
        self.slots[next].write(snap);
        self.latest.store(next, Ordering::Release);
    }

    pub fn reset(&self) {
        self.publish(&PerfSnapshot::default());
    }

    /// Always a snapshot the writer published in full. Retries only when
    /// the writer lapped this reader, i.e. published twice during one copy.
    pub fn read(&self) -> PerfSnapshot {
        loop {
            let latest = self.latest.load(Ordering::Acquire);
            if let Some(snap) = self.slots[latest].try_read() {
                return snap;
            }
            core::hint::spin_loop();
        }
    }

    pub fn fps(&self) -> f32 {
        self.read().fps
    }
}

impl Default for PerfCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Weight of the newest interval in the moving average.
const FPS_SMOOTHING: f32 = 0.2;
/// Intervals shorter than this are treated as a double tick and ignored.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Exponential moving average of the tick rate.
///
/// Anchored at initialization so the first tick already yields a rate.
#[derive(Debug, Clone, Copy)]
pub struct FpsMeter {
    last: Instant,
    fps: f32,
}

impl FpsMeter {
    pub fn new(anchor: Instant) -> Self {
        Self { last: anchor, fps: 0.0 }
    }

    pub fn record(&mut self, now: Instant) -> f32 {
        let Some(dt) = now.checked_duration_since(self.last) else {
            return self.fps;
        };
        if dt < MIN_INTERVAL {
            return self.fps;
        }
        let instant_fps = 1_000_000.0 / dt.as_micros() as f32;
        self.fps = if self.fps == 0.0 {
            instant_fps
        } else {
            self.fps + FPS_SMOOTHING * (instant_fps - self.fps)
        };
        self.last = now;
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// Saturating microseconds between two instants.
pub fn elapsed_us(from: Instant, to: Instant) -> u32 {
    to.checked_duration_since(from)
        .map(|d| d.as_micros().min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}
