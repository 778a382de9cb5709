//! Frame buffer pipeline.
//!
//! Three slots: one committed frame per eye plus one in flight. A
//! submission fills the in-flight slot, sends it, and only on success swaps
//! it with the eye's committed slot, so a failed transfer never disturbs
//! what the eye is known to show. Slots and bus sit behind one async mutex:
//! a submission is a single lock hold from fill to swap.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;

use crate::board::Board;
use crate::bus::EyeBus;
use crate::config::Topology;
use crate::error::EyesError;
use crate::framebuffer::{Eye, FrameBuffer};
use crate::state::DisplayMode;

/// Outcome of a submission that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    Sent,
    /// The eye has no panel of its own (single or mirrored display)
    NoPanel,
}

struct Inner<'a, B: Board> {
    slots: &'a mut [FrameBuffer; 3],
    committed: [usize; 2],
    in_flight: usize,
    topology: Topology,
    bus: Option<EyeBus<B>>,
}

impl<B: Board> Inner<'_, B> {
    fn committed_slot(&self, eye: Eye) -> usize {
        match (self.topology, eye) {
            // one panel shows both eyes
            (Topology::Mirrored, Eye::Right) => self.committed[Eye::Left.index()],
            _ => self.committed[eye.index()],
        }
    }
}

pub struct Pipeline<'a, M: RawMutex, B: Board> {
    inner: Mutex<M, Inner<'a, B>>,
}

impl<'a, M: RawMutex, B: Board> Pipeline<'a, M, B> {
    pub fn new(slots: &'a mut [FrameBuffer; 3]) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots,
                committed: [0, 1],
                in_flight: 2,
                topology: Topology::Single,
                bus: None,
            }),
        }
    }

    /// Take ownership of a brought-up bus. Committed frames start black,
    /// matching freshly initialized panels.
    pub async fn install(&self, bus: EyeBus<B>) {
        let mut inner = self.inner.lock().await;
        for slot in inner.slots.iter_mut() {
            slot.fill_raw(0);
        }
        inner.committed = [0, 1];
        inner.in_flight = 2;
        inner.topology = bus.topology();
        inner.bus = Some(bus);
    }

    /// Hand the bus back. Waits for a transfer in progress. `None` if
    /// nothing was installed.
    pub async fn teardown(&self) -> Option<EyeBus<B>> {
        self.inner.lock().await.bus.take()
    }

    /// Fill the in-flight frame with `fill`, send it to `eye` and commit it.
    pub async fn submit(
        &self,
        eye: Eye,
        fill: impl FnOnce(&mut FrameBuffer),
    ) -> Result<Delivery, EyesError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let Some(bus) = inner.bus.as_mut() else {
            return Err(EyesError::State(DisplayMode::Uninitialized));
        };
        let Some(panel) = bus.panel_for(eye) else {
            return Ok(Delivery::NoPanel);
        };

        let slot = inner.in_flight;
        fill(&mut inner.slots[slot]);
        bus.write_frame(panel, inner.slots[slot].pixels())?;

        core::mem::swap(&mut inner.committed[eye.index()], &mut inner.in_flight);
        Ok(Delivery::Sent)
    }

    /// Run `f` on the frame `eye` currently shows.
    pub async fn committed<R>(&self, eye: Eye, f: impl FnOnce(&FrameBuffer) -> R) -> R {
        let inner = self.inner.lock().await;
        f(&inner.slots[inner.committed_slot(eye)])
    }

    /// Run panel commands with exclusive use of the bus.
    pub async fn with_bus<R>(
        &self,
        f: impl FnOnce(&mut EyeBus<B>) -> Result<R, crate::error::BusError>,
    ) -> Result<R, EyesError> {
        let mut inner = self.inner.lock().await;
        match inner.bus.as_mut() {
            Some(bus) => Ok(f(bus)?),
            None => Err(EyesError::State(DisplayMode::Uninitialized)),
        }
    }
}
