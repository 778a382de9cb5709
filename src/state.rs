//! Display state machine.

/// Why the engine stopped producing frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorReason {
    /// Too many consecutive failed panel transfers
    TransferFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayMode {
    Uninitialized,
    Animating,
    Paused,
    /// A caller supplied frame is on the panels
    ManualImage,
    Error(ErrorReason),
}

/// Inputs that move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeEvent {
    Initialized,
    Pause,
    Resume,
    /// A manual frame was accepted while paused
    ManualFrame,
    Fault(ErrorReason),
    Teardown,
}

impl DisplayMode {
    /// Next mode after `event`. Events that make no sense in the current
    /// mode leave it unchanged; the control surface rejects those calls
    /// before they get here.
    pub fn transition(self, event: ModeEvent) -> DisplayMode {
        use DisplayMode::*;
        match (self, event) {
            (_, ModeEvent::Teardown) => Uninitialized,
            (Uninitialized, ModeEvent::Initialized) => Animating,
            (Uninitialized, _) => Uninitialized,
            (_, ModeEvent::Fault(reason)) => Error(reason),
            (Error(reason), _) => Error(reason),
            (Animating, ModeEvent::Pause) => Paused,
            (Paused, ModeEvent::Resume) => Animating,
            (Paused, ModeEvent::ManualFrame) => ManualImage,
            (ManualImage, ModeEvent::ManualFrame) => ManualImage,
            (ManualImage, ModeEvent::Resume) => Animating,
            (mode, _) => mode,
        }
    }

    /// Only an animating engine renders and transfers on its own.
    pub fn produces_frames(&self) -> bool {
        matches!(self, DisplayMode::Animating)
    }

    /// Panels and bus are claimed.
    pub fn is_initialized(&self) -> bool {
        !matches!(self, DisplayMode::Uninitialized)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, DisplayMode::Paused | DisplayMode::ManualImage)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DisplayMode::Uninitialized => "uninitialized",
            DisplayMode::Animating => "animating",
            DisplayMode::Paused => "paused",
            DisplayMode::ManualImage => "manual image",
            DisplayMode::Error(ErrorReason::TransferFailed) => "error (transfer failed)",
        }
    }
}
