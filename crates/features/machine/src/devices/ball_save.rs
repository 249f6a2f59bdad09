//! Gives drained balls back while active.

use super::owned;
use crate::error::MachineError;
use crate::handler::{BallSaveAction as Action, DeviceKey, DeviceKind, Handler};
use crate::world::{Command, World};
use pinrig_domain::Settings;
use pinrig_events::EventArgs;
use tracing::debug;

const DRAIN_PRIORITY: i32 = 1000;
const DELAYS: [&str; 3] = ["hurry_up", "grace_period", "disable"];

#[derive(Debug)]
pub struct BallSave {
    index: usize,
    name: String,
    source_playfield: usize,
    active_time: u64,
    hurry_up_time: u64,
    grace_period: u64,
    auto_launch: bool,
    balls_to_save: i64,
    enable_events: Vec<String>,
    disable_events: Vec<String>,
    timer_start_events: Vec<String>,

    enabled: bool,
    timer_started: bool,
    saves_remaining: i64,
}

impl BallSave {
    pub(crate) fn from_settings(index: usize, name: &str, settings: &Settings, source_playfield: usize) -> Self {
        Self {
            index,
            name: name.to_owned(),
            source_playfield,
            active_time: settings.ms("active_time").unwrap_or(0),
            hurry_up_time: settings.ms("hurry_up_time").unwrap_or(0),
            grace_period: settings.ms("grace_period").unwrap_or(0),
            auto_launch: settings.get("auto_launch").and_then(|v| v.as_bool()).unwrap_or(true),
            balls_to_save: settings.int("balls_to_save").unwrap_or(1),
            enable_events: owned(settings, "enable_events"),
            disable_events: owned(settings, "disable_events"),
            timer_start_events: owned(settings, "timer_start_events"),
            enabled: false,
            timer_started: false,
            saves_remaining: 0,
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

    /// Saves left; negative means unlimited.
    #[must_use]
    pub const fn saves_remaining(&self) -> i64 {
        self.saves_remaining
    }

    const fn unlimited(&self) -> bool {
        self.balls_to_save == -1
    }

    const fn handler(&self, action: Action) -> Handler {
        Handler::BallSave(self.index, action)
    }

    const fn key(&self) -> DeviceKey {
        DeviceKey { kind: DeviceKind::BallSave, index: self.index }
    }

    fn event(&self, suffix: &str) -> String {
        format!("ball_save_{}_{suffix}", self.name)
    }

    pub(crate) fn register(&self, world: &mut World) {
        let bindings = [
            (&self.enable_events, Action::Enable),
            (&self.disable_events, Action::Disable),
            (&self.timer_start_events, Action::TimerStart),
        ];
        for (events, action) in bindings {
            for event in events {
                world.add_handler(event, self.handler(action), 1);
            }
        }
    }

    pub(crate) fn handle(
        &mut self,
        action: Action,
        args: &EventArgs,
        world: &mut World,
    ) -> Result<Option<EventArgs>, MachineError> {
        match action {
            Action::Enable => self.enable(world)?,
            Action::Disable => self.disable(world)?,
            Action::TimerStart => self.timer_start(world),
            Action::HurryUp => world.post(&self.event("hurry_up"), EventArgs::new())?,
            Action::GracePeriod => world.post(&self.event("grace_period"), EventArgs::new())?,
            Action::Drain => return self.drain(args, world),
        }
        Ok(None)
    }

    pub(crate) fn enable(&mut self, world: &mut World) -> Result<(), MachineError> {
        if self.enabled {
            return Ok(());
        }
        self.saves_remaining = self.balls_to_save;
        self.enabled = true;
        debug!(ball_save = %self.name, saves = self.saves_remaining, "Enabling ball save");

        world.add_handler("ball_drain", self.handler(Action::Drain), DRAIN_PRIORITY);
        if self.timer_start_events.is_empty() {
            self.timer_start(world);
        }
        world.post(&self.event("enabled"), EventArgs::new())
    }

    pub(crate) fn disable(&mut self, world: &mut World) -> Result<(), MachineError> {
        if !self.enabled {
            return Ok(());
        }
        self.enabled = false;
        self.timer_started = false;
        debug!(ball_save = %self.name, "Disabling ball save");

        world.events.remove_handler(&self.handler(Action::Drain));
        for delay in DELAYS {
            world.cancel_delay(self.key(), delay);
        }
        world.post(&self.event("disabled"), EventArgs::new())
    }

    fn timer_start(&mut self, world: &mut World) {
        if self.timer_started || !self.enabled {
            return;
        }
        self.timer_started = true;
        if self.active_time == 0 {
            return;
        }
        debug!(ball_save = %self.name, active_ms = self.active_time, "Starting ball save timer");

        // Delays due together fire in insertion order; disable has to come last.
        world.delay(
            "hurry_up",
            self.active_time.saturating_sub(self.hurry_up_time),
            self.handler(Action::HurryUp),
        );
        world.delay("grace_period", self.active_time, self.handler(Action::GracePeriod));
        world.delay(
            "disable",
            self.active_time.saturating_add(self.grace_period),
            self.handler(Action::Disable),
        );
    }

    fn drain(&mut self, args: &EventArgs, world: &mut World) -> Result<Option<EventArgs>, MachineError> {
        let balls = args.get_i64("balls").unwrap_or(0);
        if balls <= 0 || world.balls_in_play == 0 {
            return Ok(None);
        }
        debug!(ball_save = %self.name, balls, "Ball save saving balls");
        world.post(&self.event("saving_ball"), EventArgs::new().with("balls", balls))?;
        world.commands.push(Command::AddBall {
            playfield: self.source_playfield,
            balls: u32::try_from(balls).unwrap_or(u32::MAX),
            player_controlled: !self.auto_launch,
        });

        if !self.unlimited() {
            self.saves_remaining -= balls;
            if self.saves_remaining <= 0 {
                self.disable(world)?;
            }
        }
        Ok(Some(EventArgs::new().with("balls", 0)))
    }
}
