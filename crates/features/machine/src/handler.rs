//! Handlers are data: a device index plus the action to run on it.

use strum_macros::{Display, IntoStaticStr};

/// Where a ball device can eject to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    BallDevice(usize),
    Playfield(usize),
}

impl Target {
    #[must_use]
    pub const fn is_playfield(self) -> bool {
        matches!(self, Self::Playfield(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
    BallDevice,
    Playfield,
    BallSave,
    DriverEnabled,
    Flipper,
    Mode,
}

/// Owner of delays and handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey {
    pub kind: DeviceKind,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BallDeviceAction {
    Initialize,
    WatchSources,
    CountBalls,
    Invalidate,
    MechanicalEjectStarted,
    JamSwitch,
    EntranceSwitch,
    Hold,
    BallLeft,
    EjectRequest,
    /// A target asked for balls.
    EjectTo(Target),
    DoEject,
    SourceEjectAttempt,
    SourceEjectFailed,
    RequestedBallReceived,
    BallsAddedCallback,
    PerformEject,
    MechanicalEjectCallback,
    EjectSuccess,
    EjectTimeout,
    HoldReleaseDone,
    EjectTrigger,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayfieldAction {
    WatchSources,
    SourceEjectAttempt,
    SourceEjectSuccess,
    SourceEjectFailed,
    Captured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BallSaveAction {
    Enable,
    Disable,
    TimerStart,
    HurryUp,
    GracePeriod,
    Drain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverEnabledAction {
    Enable,
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlipperAction {
    Enable,
    Disable,
    SwitchActive,
    SwitchInactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeAction {
    Start,
    Stop,
}

/// A registered callback: which device, and what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    BallDevice(usize, BallDeviceAction),
    Playfield(usize, PlayfieldAction),
    BallSave(usize, BallSaveAction),
    DriverEnabled(usize, DriverEnabledAction),
    Flipper(usize, FlipperAction),
    Mode(usize, ModeAction),
}

impl Handler {
    #[must_use]
    pub const fn owner(self) -> DeviceKey {
        let (kind, index) = match self {
            Self::BallDevice(i, _) => (DeviceKind::BallDevice, i),
            Self::Playfield(i, _) => (DeviceKind::Playfield, i),
            Self::BallSave(i, _) => (DeviceKind::BallSave, i),
            Self::DriverEnabled(i, _) => (DeviceKind::DriverEnabled, i),
            Self::Flipper(i, _) => (DeviceKind::Flipper, i),
            Self::Mode(i, _) => (DeviceKind::Mode, i),
        };
        DeviceKey { kind, index }
    }
}
