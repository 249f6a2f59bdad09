//! Devices built from the validated config.
//!
//! Every device owns its state and reacts to [`Handler`](crate::handler::Handler)
//! actions routed by the [`Machine`](crate::Machine). Nothing here holds a reference to
//! another device: cross-device reads go through the
//! [`TargetBoard`](crate::world::TargetBoard) and cross-device writes are queued as
//! commands.

pub mod ball_device;
pub mod ball_save;
pub mod driver_enabled;
pub mod flipper;
pub mod mode;
pub mod playfield;

pub use ball_device::{BallDevice, BallDeviceStatus, ConfirmEject};
pub use ball_save::BallSave;
pub use driver_enabled::DriverEnabled;
pub use flipper::Flipper;
pub use mode::Mode;
pub use playfield::Playfield;

use crate::handler::Target;
use fxhash::FxHashMap;
use pinrig_domain::{ConfigValue, MachineConfig, Settings};

pub(crate) const BALL_DEVICES: &str = "ball_devices";
pub(crate) const PLAYFIELDS: &str = "playfields";

/// Name to index maps for the device collections that can be eject targets.
///
/// Indices follow the (sorted) order of the config collections.
#[derive(Debug, Default)]
pub(crate) struct Directory {
    ball_devices: FxHashMap<String, usize>,
    playfields: FxHashMap<String, usize>,
}

impl Directory {
    pub(crate) fn from_config(config: &MachineConfig) -> Self {
        let index = |collection: &str| -> FxHashMap<String, usize> {
            config.entries(collection).enumerate().map(|(i, (name, _))| (name.clone(), i)).collect()
        };
        Self { ball_devices: index(BALL_DEVICES), playfields: index(PLAYFIELDS) }
    }

    pub(crate) fn ball_device(&self, name: &str) -> Option<usize> {
        self.ball_devices.get(name).copied()
    }

    pub(crate) fn playfield(&self, name: &str) -> Option<usize> {
        self.playfields.get(name).copied()
    }

    /// Resolves a target by name, ball devices first.
    pub(crate) fn target(&self, name: &str) -> Option<Target> {
        self.ball_device(name)
            .map(Target::BallDevice)
            .or_else(|| self.playfield(name).map(Target::Playfield))
    }

    /// Resolves a reference value, honoring the collection it was found in.
    pub(crate) fn resolve(&self, value: &ConfigValue) -> Option<Target> {
        match value {
            ConfigValue::Ref { collection, name } if collection == PLAYFIELDS => {
                self.playfield(name).map(Target::Playfield)
            },
            ConfigValue::Ref { collection, name } if collection == BALL_DEVICES => {
                self.ball_device(name).map(Target::BallDevice)
            },
            other => other.as_str().and_then(|name| self.target(name)),
        }
    }
}

pub(crate) fn owned(settings: &Settings, key: &str) -> Vec<String> {
    settings.names(key).into_iter().map(str::to_owned).collect()
}

pub(crate) fn optional(settings: &Settings, key: &str) -> Option<String> {
    settings.str(key).filter(|s| !s.is_empty()).map(str::to_owned)
}
