//! Services shared by every device while it handles an event.

use crate::delays::DelayManager;
use crate::drivers::DriverBank;
use crate::error::MachineError;
use crate::handler::{DeviceKey, Handler, Target};
use crate::switches::SwitchController;
use fxhash::FxHashMap;
use pinrig_events::{EventArgs, EventBus, HandlerKey};
use serde::Serialize;

/// What an eject target reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub name: String,
    pub is_playfield: bool,
    /// Balls it can take right now; `u32::MAX` for a playfield.
    pub capacity: u32,
    /// A playfield switch hit can stand in for an eject confirmation.
    pub ok_to_confirm_via_switch: bool,
}

/// Published status of every eject target.
#[derive(Debug, Default)]
pub struct TargetBoard {
    statuses: FxHashMap<Target, TargetStatus>,
    by_name: FxHashMap<String, Target>,
}

impl TargetBoard {
    pub(crate) fn publish(&mut self, target: Target, status: TargetStatus) {
        self.by_name.insert(status.name.clone(), target);
        self.statuses.insert(target, status);
    }

    #[must_use]
    pub fn get(&self, target: Target) -> Option<&TargetStatus> {
        self.statuses.get(&target)
    }

    /// Ball devices shadow playfields of the same name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Target> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn name(&self, target: Target) -> &str {
        self.get(target).map_or("", |s| s.name.as_str())
    }

    #[must_use]
    pub fn capacity(&self, target: Target) -> u32 {
        self.get(target).map_or(0, |s| s.capacity)
    }
}

/// A request that reaches across devices, run by the machine after the handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    AddBall { playfield: usize, balls: u32, player_controlled: bool },
    DriverEnabledCascade { coil: String, enabled: bool },
}

#[derive(Debug)]
pub(crate) struct World {
    pub(crate) now: u64,
    pub(crate) events: EventBus<Handler>,
    pub(crate) delays: DelayManager,
    pub(crate) switches: SwitchController,
    pub(crate) drivers: DriverBank,
    pub(crate) targets: TargetBoard,
    pub(crate) commands: Vec<Command>,
    pub(crate) balls_known: u32,
    pub(crate) balls_in_play: u32,
}

impl World {
    pub(crate) fn post(&mut self, event: &str, args: EventArgs) -> Result<(), MachineError> {
        Ok(self.events.post(event, args)?)
    }

    pub(crate) fn post_relay(
        &mut self,
        event: &str,
        args: EventArgs,
        callback: Option<Handler>,
    ) -> Result<(), MachineError> {
        Ok(self.events.post_relay(event, args, callback)?)
    }

    pub(crate) fn post_queue(
        &mut self,
        event: &str,
        args: EventArgs,
        callback: Handler,
    ) -> Result<(), MachineError> {
        Ok(self.events.post_queue(event, args, callback)?)
    }

    pub(crate) fn add_handler(&mut self, event: &str, handler: Handler, priority: i32) -> HandlerKey {
        self.events.add_handler(event, handler, priority)
    }

    /// Schedules `handler` `ms` from now under `name`.
    pub(crate) fn delay(&mut self, name: &'static str, ms: u64, handler: Handler) {
        self.delays.add(name, self.now.saturating_add(ms), handler);
    }

    pub(crate) fn cancel_delay(&mut self, owner: DeviceKey, name: &str) {
        self.delays.remove(owner, name);
    }

    pub(crate) fn is_active(&self, switch: &str, ms: u64) -> bool {
        self.switches.is_active(switch, ms, self.now)
    }

    pub(crate) fn is_inactive(&self, switch: &str, ms: u64) -> bool {
        self.switches.is_inactive(switch, ms, self.now)
    }
}
