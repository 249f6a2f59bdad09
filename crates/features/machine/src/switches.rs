use crate::error::MachineError;
use crate::handler::Handler;
use fxhash::FxHashMap;
use pinrig_domain::MachineConfig;
use serde::Serialize;
use tracing::{debug, trace, warn};

/// One configured switch and its logical state.
#[derive(Debug, Clone, Serialize)]
pub struct Switch {
    pub name: String,
    pub number: String,
    /// Normally-closed switches read inverted from hardware.
    pub invert: bool,
    pub active: bool,
    /// `None` until the switch first changes; such a switch has held its state forever.
    pub changed_at: Option<u64>,
    pub tags: Vec<String>,
    #[serde(skip)]
    events_when_activated: Vec<String>,
    #[serde(skip)]
    events_when_deactivated: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    switch: usize,
    state: bool,
    ms: u64,
    handler: Handler,
}

#[derive(Debug, Clone)]
struct Timer {
    due: u64,
    seq: u64,
    switch: usize,
    handler: Handler,
}

/// What a state change asks the machine to do.
#[derive(Debug, Default)]
pub(crate) struct SwitchChange {
    /// Handlers registered with `ms == 0`, in registration order.
    pub(crate) immediate: Vec<Handler>,
    pub(crate) events: Vec<String>,
}

/// Switch states plus handlers that fire when a switch holds a state long enough.
#[derive(Debug, Default)]
pub struct SwitchController {
    switches: Vec<Switch>,
    by_name: FxHashMap<String, usize>,
    by_number: FxHashMap<String, usize>,
    handlers: Vec<Registration>,
    timers: Vec<Timer>,
    seq: u64,
}

impl SwitchController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the controller from the `switches` section.
    #[must_use]
    pub fn from_config(config: &MachineConfig) -> Self {
        let mut controller = Self::new();
        for (name, settings) in config.entries("switches") {
            let number = match settings.get("number") {
                Some(value) if !value.is_null() => value.to_string(),
                _ => String::new(),
            };
            let invert = settings.str("type").is_some_and(|t| t.eq_ignore_ascii_case("NC"));
            controller.add(Switch {
                name: name.clone(),
                number,
                invert,
                active: false,
                changed_at: None,
                tags: settings.names("tags").into_iter().map(str::to_owned).collect(),
                events_when_activated: owned(settings.names("events_when_activated")),
                events_when_deactivated: owned(settings.names("events_when_deactivated")),
            });
        }
        controller
    }

    pub fn add(&mut self, switch: Switch) {
        let index = self.switches.len();
        self.by_name.insert(switch.name.clone(), index);
        if !switch.number.is_empty() {
            self.by_number.insert(switch.number.clone(), index);
        }
        self.switches.push(switch);
    }

    fn index(&self, name: &str) -> Result<usize, MachineError> {
        self.by_name.get(name).copied().ok_or_else(|| MachineError::unknown("switch", name))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Switch> {
        self.by_name.get(name).map(|&i| &self.switches[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Switch> {
        self.switches.iter()
    }

    /// Name of the switch wired to hardware `number`.
    #[must_use]
    pub fn name_for_number(&self, number: &str) -> Option<&str> {
        self.by_number.get(number).map(|&i| self.switches[i].name.as_str())
    }

    /// Logical state for a raw hardware reading.
    #[must_use]
    pub fn logical_state(&self, name: &str, raw: bool) -> Option<bool> {
        self.get(name).map(|s| raw ^ s.invert)
    }

    /// Calls `handler` once `switch` has been in `state` for `ms`.
    ///
    /// A handler equal to an existing registration is not added twice.
    pub fn add_handler(
        &mut self,
        switch: &str,
        state: bool,
        ms: u64,
        handler: Handler,
    ) -> Result<(), MachineError> {
        let registration = Registration { switch: self.index(switch)?, state, ms, handler };
        if !self.handlers.contains(&registration) {
            trace!(switch, state, ms, handler = ?handler, "Switch handler added");
            self.handlers.push(registration);
        }
        Ok(())
    }

    /// Removes `handler` from `switch` for `state`, including pending timers.
    pub fn remove_handler(&mut self, switch: &str, state: bool, handler: Handler) {
        let Some(&index) = self.by_name.get(switch) else {
            return;
        };
        self.handlers.retain(|r| !(r.switch == index && r.state == state && r.handler == handler));
        self.timers.retain(|t| !(t.switch == index && t.handler == handler));
    }

    /// Removes `handler` from every switch.
    pub fn remove_handler_everywhere(&mut self, handler: Handler) {
        self.handlers.retain(|r| r.handler != handler);
        self.timers.retain(|t| t.handler != handler);
    }

    #[must_use]
    pub fn has_handler(&self, switch: &str, state: bool, handler: Handler) -> bool {
        self.by_name.get(switch).is_some_and(|&index| {
            self.handlers.iter().any(|r| r.switch == index && r.state == state && r.handler == handler)
        })
    }

    /// Sets a state without firing handlers or events, as if it had always been so.
    pub fn set_initial(&mut self, name: &str, active: bool) -> Result<(), MachineError> {
        let index = self.index(name)?;
        let switch = &mut self.switches[index];
        switch.active = active;
        switch.changed_at = None;
        Ok(())
    }

    /// Records a logical state change. Returns `None` when the state didn't change.
    pub(crate) fn set_state(
        &mut self,
        name: &str,
        active: bool,
        now: u64,
    ) -> Result<Option<SwitchChange>, MachineError> {
        let index = self.index(name)?;
        let switch = &mut self.switches[index];
        if switch.active == active {
            trace!(switch = name, active, "Switch state unchanged");
            return Ok(None);
        }
        switch.active = active;
        switch.changed_at = Some(now);
        debug!(switch = name, active, now, "Switch changed");

        let mut change = SwitchChange::default();
        if active {
            change.events.extend(switch.events_when_activated.iter().cloned());
            change.events.extend(switch.tags.iter().map(|tag| format!("sw_{tag}")));
        } else {
            change.events.extend(switch.events_when_deactivated.iter().cloned());
        }

        // Anything still waiting was waiting for the previous state.
        self.timers.retain(|t| t.switch != index);

        for registration in self.handlers.iter().filter(|r| r.switch == index && r.state == active) {
            if registration.ms == 0 {
                change.immediate.push(registration.handler);
            } else {
                self.seq += 1;
                self.timers.push(Timer {
                    due: now.saturating_add(registration.ms),
                    seq: self.seq,
                    switch: index,
                    handler: registration.handler,
                });
            }
        }
        Ok(Some(change))
    }

    /// Whether `name` is active and has been for at least `ms`.
    #[must_use]
    pub fn is_active(&self, name: &str, ms: u64, now: u64) -> bool {
        self.is_state(name, true, ms, now)
    }

    /// Whether `name` is inactive and has been for at least `ms`.
    #[must_use]
    pub fn is_inactive(&self, name: &str, ms: u64, now: u64) -> bool {
        self.is_state(name, false, ms, now)
    }

    fn is_state(&self, name: &str, state: bool, ms: u64, now: u64) -> bool {
        let Some(switch) = self.get(name) else {
            warn!(switch = name, "State check for unknown switch");
            return false;
        };
        switch.active == state && switch.changed_at.is_none_or(|at| now.saturating_sub(at) >= ms)
    }

    /// Removes and returns the earliest timed handler due at `now`, as `(due, seq, handler)`.
    pub(crate) fn pop_due(&mut self, now: u64) -> Option<(u64, u64, Handler)> {
        let (index, _) = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.seq))?;
        let timer = self.timers.remove(index);
        Some((timer.due, timer.seq, timer.handler))
    }

    /// Earliest pending timer.
    pub(crate) fn next_due(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.due).min()
    }
}

fn owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_owned).collect()
}
