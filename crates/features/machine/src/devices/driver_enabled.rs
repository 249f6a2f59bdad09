use super::owned;
use crate::error::MachineError;
use crate::handler::{DriverEnabledAction as Action, Handler};
use crate::world::{Command, World};
use pinrig_domain::Settings;
use pinrig_events::EventArgs;
use tracing::{debug, warn};

/// A device powered through a shared driver, such as a pop bumper bank.
#[derive(Debug)]
pub struct DriverEnabled {
    index: usize,
    name: String,
    driver: String,
    enable_events: Vec<String>,
    disable_events: Vec<String>,
    enabled: bool,
}

impl DriverEnabled {
    pub(crate) fn from_settings(index: usize, name: &str, settings: &Settings) -> Self {
        Self {
            index,
            name: name.to_owned(),
            driver: settings.str("driver").unwrap_or_default().to_owned(),
            enable_events: owned(settings, "enable_events"),
            disable_events: owned(settings, "disable_events"),
            enabled: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn driver(&self) -> &str {
        &self.driver
    }

    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn register(&self, world: &mut World) {
        for event in &self.enable_events {
            world.add_handler(event, Handler::DriverEnabled(self.index, Action::Enable), 1);
        }
        for event in &self.disable_events {
            world.add_handler(event, Handler::DriverEnabled(self.index, Action::Disable), 1);
        }
    }

    pub(crate) fn handle(&mut self, action: Action, world: &mut World) -> Result<Option<EventArgs>, MachineError> {
        let enabled = matches!(action, Action::Enable);
        debug!(device = %self.name, driver = %self.driver, enabled, "Driver-enabled device changed");
        if enabled {
            world.drivers.enable(&self.driver)?;
        } else {
            world.drivers.disable(&self.driver)?;
        }
        world.commands.push(Command::DriverEnabledCascade { coil: self.driver.clone(), enabled });
        Ok(None)
    }

    /// Pulsing is not supported on a driver-enabled device.
    pub fn pulse(&self) {
        warn!(device = %self.name, "Pulse on a driver-enabled device ignored");
    }

    pub fn timed_enable(&self, ms: u64) {
        warn!(device = %self.name, ms, "Timed enable on a driver-enabled device ignored");
    }
}
