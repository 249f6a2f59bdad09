use super::owned;
use crate::error::MachineError;
use crate::handler::{Handler, ModeAction as Action};
use crate::world::World;
use pinrig_domain::Settings;
use pinrig_events::EventArgs;
use tracing::debug;

#[derive(Debug)]
pub struct Mode {
    index: usize,
    name: String,
    priority: i64,
    start_events: Vec<String>,
    stop_events: Vec<String>,
    active: bool,
}

impl Mode {
    pub(crate) fn from_settings(index: usize, name: &str, settings: &Settings) -> Self {
        Self {
            index,
            name: name.to_owned(),
            priority: settings.int("priority").unwrap_or(100),
            start_events: owned(settings, "start_events"),
            stop_events: owned(settings, "stop_events"),
            active: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.priority
    }

    #[must_use]
    pub const fn active(&self) -> bool {
        self.active
    }

    pub(crate) fn register(&self, world: &mut World) {
        for event in &self.start_events {
            world.add_handler(event, Handler::Mode(self.index, Action::Start), 1);
        }
        for event in &self.stop_events {
            world.add_handler(event, Handler::Mode(self.index, Action::Stop), 1);
        }
    }

    pub(crate) fn handle(&mut self, action: Action, world: &mut World) -> Result<Option<EventArgs>, MachineError> {
        let start = matches!(action, Action::Start);
        if self.active == start {
            return Ok(None);
        }
        self.active = start;
        debug!(mode = %self.name, priority = self.priority, active = start, "Mode changed");
        let suffix = if start { "started" } else { "stopped" };
        world.post(&format!("mode_{}_{suffix}", self.name), EventArgs::new().with("priority", self.priority))?;
        Ok(None)
    }
}
