use super::{optional, owned};
use crate::error::MachineError;
use crate::handler::{FlipperAction as Action, Handler};
use crate::world::World;
use pinrig_domain::Settings;
use pinrig_events::EventArgs;
use tracing::debug;

#[derive(Debug)]
pub struct Flipper {
    index: usize,
    name: String,
    main_coil: String,
    hold_coil: Option<String>,
    activation_switch: String,
    enable_events: Vec<String>,
    disable_events: Vec<String>,
    enabled: bool,
}

impl Flipper {
    pub(crate) fn from_settings(index: usize, name: &str, settings: &Settings) -> Self {
        Self {
            index,
            name: name.to_owned(),
            main_coil: settings.str("main_coil").unwrap_or_default().to_owned(),
            hold_coil: optional(settings, "hold_coil"),
            activation_switch: settings.str("activation_switch").unwrap_or_default().to_owned(),
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
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    const fn handler(&self, action: Action) -> Handler {
        Handler::Flipper(self.index, action)
    }

    pub(crate) fn register(&self, world: &mut World) {
        for event in &self.enable_events {
            world.add_handler(event, self.handler(Action::Enable), 1);
        }
        for event in &self.disable_events {
            world.add_handler(event, self.handler(Action::Disable), 1);
        }
    }

    pub(crate) fn handle(&mut self, action: Action, world: &mut World) -> Result<Option<EventArgs>, MachineError> {
        match action {
            Action::Enable => self.enable(world)?,
            Action::Disable => self.disable(world)?,
            Action::SwitchActive => self.activate(world)?,
            Action::SwitchInactive => self.release(world)?,
        }
        Ok(None)
    }

    fn enable(&mut self, world: &mut World) -> Result<(), MachineError> {
        if self.enabled {
            return Ok(());
        }
        self.enabled = true;
        debug!(flipper = %self.name, "Enabling flipper");
        world.switches.add_handler(&self.activation_switch, true, 0, self.handler(Action::SwitchActive))?;
        world.switches.add_handler(&self.activation_switch, false, 0, self.handler(Action::SwitchInactive))
    }

    fn disable(&mut self, world: &mut World) -> Result<(), MachineError> {
        if !self.enabled {
            return Ok(());
        }
        self.enabled = false;
        debug!(flipper = %self.name, "Disabling flipper");
        world.switches.remove_handler(&self.activation_switch, true, self.handler(Action::SwitchActive));
        world.switches.remove_handler(&self.activation_switch, false, self.handler(Action::SwitchInactive));
        self.release(world)
    }

    fn activate(&self, world: &mut World) -> Result<(), MachineError> {
        match &self.hold_coil {
            Some(hold) => {
                world.drivers.pulse(&self.main_coil)?;
                world.drivers.enable(hold)
            },
            None => world.drivers.enable(&self.main_coil),
        }
    }

    fn release(&self, world: &mut World) -> Result<(), MachineError> {
        world.drivers.disable(&self.main_coil)?;
        if let Some(hold) = &self.hold_coil {
            world.drivers.disable(hold)?;
        }
        Ok(())
    }
}
