//! Anything that holds balls: troughs, eject holes, VUKs, plunger lanes.
//!
//! A device counts its balls from its switches, ejects them to targets one queue entry
//! at a time, and confirms each eject by the configured means before starting the
//! next. Failed ejects go back to the front of the queue and are retried up to
//! `max_eject_attempts`.

use super::{Directory, optional, owned};
use crate::error::MachineError;
use crate::handler::{BallDeviceAction as Action, DeviceKey, DeviceKind, Handler, Target};
use crate::world::{TargetBoard, World};
use pinrig_domain::Settings;
use pinrig_events::{EventArgs, HandlerKey};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, warn};

const CONFIRM_TIMEOUT: &str = "target_eject_confirmation_timeout";
const HOLD_COIL_RELEASE: &str = "hold_coil_release";
const TARGET_ENTER_PRIORITY: i32 = 100_000;
const REQUESTED_BALL_PRIORITY: i32 = 1000;

/// How a device learns that an eject worked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "lowercase")]
pub enum ConfirmEject {
    /// The target reports the ball entering.
    Target,
    Switch(String),
    Event(String),
    /// A recount shows the ball gone.
    Count,
    /// Assumed after 1 ms.
    Fake,
}

impl ConfirmEject {
    fn from_settings(name: &str, settings: &Settings) -> Result<Self, MachineError> {
        let path = |field: &str| format!("ball_devices.{name}.{field}");
        match settings.str("confirm_eject_type").unwrap_or("target") {
            "target" => Ok(Self::Target),
            "count" => Ok(Self::Count),
            "fake" => Ok(Self::Fake),
            "switch" => optional(settings, "confirm_eject_switch")
                .map(Self::Switch)
                .ok_or_else(|| MachineError::invalid(path("confirm_eject_switch"), "required")),
            "event" => optional(settings, "confirm_eject_event")
                .map(Self::Event)
                .ok_or_else(|| MachineError::invalid(path("confirm_eject_event"), "required")),
            other => Err(MachineError::invalid(
                path("confirm_eject_type"),
                format!("unknown confirmation '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone)]
struct EjectTarget {
    target: Target,
    name: String,
    timeout: u64,
}

#[derive(Debug, Clone)]
struct BallDeviceConfig {
    ball_switches: Vec<String>,
    entrance_count_delay: u64,
    exit_count_delay: u64,
    capacity: u32,
    eject_coil: Option<String>,
    hold_coil: Option<String>,
    hold_coil_release_time: u64,
    hold_switches: Vec<String>,
    jam_switch: Option<String>,
    entrance_switch: Option<String>,
    confirm: ConfirmEject,
    targets: Vec<EjectTarget>,
    max_eject_attempts: u32,
    balls_per_eject: u32,
    mechanical_eject: bool,
    mechanical_eject_trigger_time: u64,
    eject_events: Vec<String>,
    captures_from: String,
    tags: Vec<String>,
}

/// A snapshot for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BallDeviceStatus {
    pub balls: u32,
    pub eject_in_progress_target: Option<String>,
    pub eject_queue: Vec<String>,
}

#[derive(Debug)]
pub struct BallDevice {
    index: usize,
    name: String,
    config: BallDeviceConfig,
    /// Names of devices that eject here.
    sources: Vec<String>,

    balls: u32,
    eject_queue: VecDeque<(Target, u64)>,
    num_eject_attempts: u32,
    eject_in_progress_target: Option<Target>,
    num_balls_requested: u32,
    num_balls_in_transit: u32,
    num_jam_switch_count: u32,
    num_balls_ejecting: u32,
    confirm_via_count: bool,
    manual_eject_target: Option<Target>,
    mechanical_eject_in_progress: u32,
    waiting_for_eject_trigger: bool,
    ball_did_leave: bool,
    valid: bool,
    need_first_time_count: bool,
    pending_eject_event_keys: Vec<HandlerKey>,
    hold_release_in_progress: bool,
}

impl BallDevice {
    pub(crate) fn from_settings(
        index: usize,
        name: &str,
        settings: &Settings,
        directory: &Directory,
    ) -> Result<Self, MachineError> {
        let ball_switches = owned(settings, "ball_switches");
        let timeouts = settings.list("eject_timeouts");
        let targets = settings
            .list("eject_targets")
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let target = directory.resolve(value).ok_or_else(|| MachineError::UnknownDevice {
                    kind: "eject target",
                    name: value.to_string(),
                    context: Some(format!("ball_devices.{name}.eject_targets").into()),
                })?;
                Ok(EjectTarget {
                    target,
                    name: value.to_string(),
                    timeout: timeouts.get(i).and_then(|t| t.as_ms()).unwrap_or(0),
                })
            })
            .collect::<Result<Vec<_>, MachineError>>()?;

        let capacity = settings
            .int("ball_capacity")
            .map_or(ball_switches.len() as u32, |c| u32::try_from(c).unwrap_or(0));

        let config = BallDeviceConfig {
            entrance_count_delay: settings.ms("entrance_count_delay").unwrap_or(500),
            exit_count_delay: settings.ms("exit_count_delay").unwrap_or(500),
            capacity,
            eject_coil: optional(settings, "eject_coil"),
            hold_coil: optional(settings, "hold_coil"),
            hold_coil_release_time: settings.ms("hold_coil_release_time").unwrap_or(1000),
            hold_switches: owned(settings, "hold_switches"),
            jam_switch: optional(settings, "jam_switch"),
            entrance_switch: optional(settings, "entrance_switch"),
            confirm: ConfirmEject::from_settings(name, settings)?,
            targets,
            max_eject_attempts: settings.int("max_eject_attempts").map_or(0, |v| v.max(0) as u32),
            balls_per_eject: settings.int("balls_per_eject").map_or(1, |v| v.max(1) as u32),
            mechanical_eject: settings.bool("mechanical_eject"),
            mechanical_eject_trigger_time: settings.ms("mechanical_eject_trigger_time").unwrap_or(200),
            eject_events: owned(settings, "eject_events"),
            captures_from: settings.str("captures_from").unwrap_or("playfield").to_owned(),
            tags: owned(settings, "tags"),
            ball_switches,
        };

        Ok(Self {
            index,
            name: name.to_owned(),
            config,
            sources: Vec::new(),
            balls: 0,
            eject_queue: VecDeque::new(),
            num_eject_attempts: 0,
            eject_in_progress_target: None,
            num_balls_requested: 0,
            num_balls_in_transit: 0,
            num_jam_switch_count: 0,
            num_balls_ejecting: 0,
            confirm_via_count: false,
            manual_eject_target: None,
            mechanical_eject_in_progress: 0,
            waiting_for_eject_trigger: false,
            ball_did_leave: false,
            valid: false,
            need_first_time_count: true,
            pending_eject_event_keys: Vec::new(),
            hold_release_in_progress: false,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn balls(&self) -> u32 {
        self.balls
    }

    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.config.capacity
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.config.tags
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.config.tags.iter().any(|t| t == tag)
    }

    #[must_use]
    pub const fn eject_in_progress(&self) -> Option<Target> {
        self.eject_in_progress_target
    }

    #[must_use]
    pub fn eject_queue_len(&self) -> usize {
        self.eject_queue.len()
    }

    #[must_use]
    pub const fn num_eject_attempts(&self) -> u32 {
        self.num_eject_attempts
    }

    #[must_use]
    pub const fn num_balls_requested(&self) -> u32 {
        self.num_balls_requested
    }

    /// Whether the last count completed without a switch settling.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub const fn confirm(&self) -> &ConfirmEject {
        &self.config.confirm
    }

    pub(crate) fn eject_targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.config.targets.iter().map(|t| t.target)
    }

    pub(crate) fn set_sources(&mut self, sources: Vec<String>) {
        self.sources = sources;
    }

    #[must_use]
    pub fn status(&self, targets: &TargetBoard) -> BallDeviceStatus {
        BallDeviceStatus {
            balls: self.balls,
            eject_in_progress_target: self
                .eject_in_progress_target
                .map(|t| targets.name(t).to_owned()),
            eject_queue: self.eject_queue.iter().map(|(t, _)| targets.name(*t).to_owned()).collect(),
        }
    }

    /// Balls this device can take right now. Zero while ejecting.
    #[must_use]
    pub fn additional_capacity(&self) -> u32 {
        if self.num_balls_ejecting > 0 {
            return 0;
        }
        self.config.capacity.saturating_sub(self.balls)
    }

    const fn key(&self) -> DeviceKey {
        DeviceKey { kind: DeviceKind::BallDevice, index: self.index }
    }

    const fn handler(&self, action: Action) -> Handler {
        Handler::BallDevice(self.index, action)
    }

    fn event(&self, suffix: &str) -> String {
        format!("balldevice_{}_{suffix}", self.name)
    }

    fn default_target(&self) -> Result<Target, MachineError> {
        self.config.targets.first().map(|t| t.target).ok_or_else(|| {
            MachineError::invalid(format!("ball_devices.{}.eject_targets", self.name), "no eject targets")
        })
    }

    fn timeout_for(&self, target: Target) -> u64 {
        self.config.targets.iter().find(|t| t.target == target).map_or(0, |t| t.timeout)
    }

    fn is_full(&self, world: &World) -> bool {
        (self.config.capacity > 0 && self.balls >= self.config.capacity)
            || self.balls >= world.balls_known
    }

    pub(crate) fn handle(
        &mut self,
        action: Action,
        args: &EventArgs,
        world: &mut World,
    ) -> Result<Option<EventArgs>, MachineError> {
        match action {
            Action::Initialize => self.initialize(world)?,
            Action::WatchSources => self.watch_sources(world),
            Action::CountBalls => {
                self.count_balls(world)?;
            },
            Action::Invalidate => self.valid = false,
            Action::MechanicalEjectStarted => self.mechanical_eject_started(world)?,
            Action::JamSwitch => {
                self.num_jam_switch_count += 1;
                debug!(device = %self.name, count = self.num_jam_switch_count, "Jam switch hit");
            },
            Action::EntranceSwitch => self.entrance_switch_hit(world)?,
            Action::Hold => self.hold(world)?,
            Action::BallLeft => self.ball_left(world),
            Action::EjectRequest => {
                let balls = args.get_u32("balls").unwrap_or(1);
                let target = args.get_str("target").and_then(|name| world.targets.find(name));
                self.eject(balls, target, None, false, world)?;
            },
            Action::EjectTo(target) => {
                let balls = args.get_u32("balls").unwrap_or(1);
                self.eject(balls, Some(target), None, true, world)?;
            },
            Action::DoEject => {
                self.do_eject(world)?;
            },
            Action::SourceEjectAttempt => self.source_eject_attempt(args, world),
            Action::SourceEjectFailed => self.source_eject_failed(args, world),
            Action::RequestedBallReceived => return Ok(Some(self.requested_ball_received(args, world))),
            Action::BallsAddedCallback => self.balls_added_callback(args, world)?,
            Action::PerformEject => self.perform_eject(args, world)?,
            Action::MechanicalEjectCallback => {},
            Action::EjectSuccess => self.eject_success(world)?,
            Action::EjectTimeout => self.eject_failed(true, false, world)?,
            Action::HoldReleaseDone => self.hold_release_done(world)?,
            Action::EjectTrigger => {
                let target = self.manual_eject_target;
                let balls = args.get_u32("balls").unwrap_or(1);
                self.eject(balls, target, None, false, world)?;
            },
            Action::Stop => self.stop(world)?,
        }
        Ok(None)
    }

    fn initialize(&mut self, world: &mut World) -> Result<(), MachineError> {
        let count = self.handler(Action::CountBalls);
        let invalidate = self.handler(Action::Invalidate);
        for switch in &self.config.ball_switches {
            world.switches.add_handler(switch, true, self.config.entrance_count_delay, count)?;
            world.switches.add_handler(switch, false, self.config.exit_count_delay, count)?;
            world.switches.add_handler(switch, true, 0, invalidate)?;
            world.switches.add_handler(switch, false, 0, invalidate)?;
            if self.config.mechanical_eject {
                world.switches.add_handler(
                    switch,
                    false,
                    self.config.mechanical_eject_trigger_time,
                    self.handler(Action::MechanicalEjectStarted),
                )?;
            }
        }
        if let Some(jam) = &self.config.jam_switch {
            world.switches.add_handler(jam, true, 0, self.handler(Action::JamSwitch))?;
        }
        if let Some(entrance) = &self.config.entrance_switch {
            world.switches.add_handler(entrance, true, 0, self.handler(Action::EntranceSwitch))?;
        }
        for switch in &self.config.hold_switches {
            world.switches.add_handler(switch, true, 0, self.handler(Action::Hold))?;
        }

        for target in &self.config.targets {
            world.add_handler(
                &format!("balldevice_{}_ball_request", target.name),
                self.handler(Action::EjectTo(target.target)),
                1,
            );
            world.add_handler(
                &format!("balldevice_{}_ok_to_receive", target.name),
                self.handler(Action::DoEject),
                1,
            );
        }
        for event in &self.config.eject_events {
            world.add_handler(event, self.handler(Action::EjectTrigger), 1);
        }
        world.add_handler(&self.event("ball_eject_request"), self.handler(Action::EjectRequest), 1);

        self.count_balls(world)?;
        Ok(())
    }

    fn watch_sources(&self, world: &mut World) {
        for source in &self.sources {
            debug!(device = %self.name, source = %source, "Watching ejects from source");
            world.add_handler(
                &format!("balldevice_{source}_ball_eject_failed"),
                self.handler(Action::SourceEjectFailed),
                1,
            );
            world.add_handler(
                &format!("balldevice_{source}_ball_eject_attempt"),
                self.handler(Action::SourceEjectAttempt),
                1,
            );
        }
    }

    fn source_eject_attempt(&mut self, args: &EventArgs, world: &mut World) {
        if args.get_str("target") != Some(self.name.as_str()) {
            return;
        }
        let balls = args.get_u32("balls").unwrap_or(1);
        debug!(device = %self.name, balls, "Waiting for balls");
        self.num_balls_in_transit += balls;
        if self.num_balls_requested > 0 {
            world.add_handler(
                &self.event("ball_enter"),
                self.handler(Action::RequestedBallReceived),
                REQUESTED_BALL_PRIORITY,
            );
        }
    }

    fn source_eject_failed(&mut self, args: &EventArgs, world: &mut World) {
        if args.get_str("target") != Some(self.name.as_str()) {
            return;
        }
        let balls = args.get_u32("balls").unwrap_or(1);
        self.num_balls_in_transit = self.num_balls_in_transit.saturating_sub(balls);
        if self.num_balls_in_transit == 0 {
            world.events.remove_handler(&self.handler(Action::RequestedBallReceived));
        }
    }

    /// Counts balls from the switches and acts on any change. Returns the count.
    ///
    /// A switch that changed too recently aborts the count; its timed handler counts
    /// again once it settles.
    pub(crate) fn count_balls(&mut self, world: &mut World) -> Result<u32, MachineError> {
        self.valid = true;

        if self.config.ball_switches.is_empty() {
            if self.need_first_time_count {
                self.balls = 0;
                self.need_first_time_count = false;
            }
            return Ok(self.balls);
        }

        let previous = self.balls;
        let mut count = 0;
        for switch in &self.config.ball_switches {
            if world.is_active(switch, self.config.entrance_count_delay) {
                count += 1;
            } else if !world.is_inactive(switch, self.config.exit_count_delay) {
                debug!(device = %self.name, switch = %switch, "Switch changed too recently, keeping previous count");
                self.valid = false;
                return Ok(previous);
            }
        }

        self.balls = count;
        let change = if self.need_first_time_count {
            0
        } else {
            i64::from(count) - i64::from(previous)
        };
        self.need_first_time_count = false;
        debug!(device = %self.name, balls = count, change, "Counted balls");

        if change == 0
            && self.confirm_via_count
            && self.eject_in_progress_target.is_some()
            && self.ball_did_leave
        {
            self.eject_success(world)?;
        }
        self.status_dump();

        if change > 0 {
            if self.mechanical_eject_in_progress > 0 && self.eject_in_progress_target.is_some() {
                self.mechanical_eject_failed(world)?;
                world.post(&self.event("player_controlled_eject_failed"), EventArgs::new())?;
            } else {
                self.balls_added(change as u32, world)?;
            }
        } else if change < 0 {
            self.balls_missing(change.unsigned_abs() as u32, world)?;
        }
        Ok(self.balls)
    }

    fn balls_added(&mut self, balls: u32, world: &mut World) -> Result<(), MachineError> {
        let in_progress = self.eject_in_progress_target.is_some();
        let has_jam = self.config.jam_switch.is_some();

        if in_progress && has_jam && self.num_jam_switch_count > 1 {
            debug!(device = %self.name, jam = self.num_jam_switch_count, "Ball fell back in, eject failed");
            return self.eject_failed(true, false, world);
        }

        if !in_progress || (has_jam && self.num_jam_switch_count == 1) {
            if self.num_balls_in_transit == 0 {
                world.post(
                    &format!("balldevice_captured_from_{}", self.config.captures_from),
                    EventArgs::new().with("balls", balls),
                )?;
            }
            world.post_relay(
                &self.event("ball_enter"),
                EventArgs::new().with("balls", balls).with("device", self.name.as_str()),
                Some(self.handler(Action::BallsAddedCallback)),
            )?;
        }

        if self.mechanical_eject_in_progress > 0 && self.eject_in_progress_target.is_some() {
            debug!(device = %self.name, "Ball added while waiting for player eject");
            self.mechanical_eject_failed(world)?;
            world.post(&self.event("player_controlled_eject_failed"), EventArgs::new())?;
        }
        Ok(())
    }

    fn balls_added_callback(&mut self, args: &EventArgs, world: &mut World) -> Result<(), MachineError> {
        if self.mechanical_eject_in_progress > 0 || self.waiting_for_eject_trigger {
            return Ok(());
        }
        let balls = args.get_u32("balls").unwrap_or(0);
        // Unclaimed balls are stuck here; a trough keeps them.
        if balls > 0 && !self.has_tag("trough") {
            self.eject(balls, None, None, false, world)?;
        }
        if !self.eject_queue.is_empty() {
            self.do_eject(world)?;
        }
        Ok(())
    }

    fn balls_missing(&self, balls: u32, world: &mut World) -> Result<(), MachineError> {
        debug!(device = %self.name, balls, "Balls missing from device");
        if self.manual_eject_target.is_none() {
            world.post(&self.event("ball_missing"), EventArgs::new().with("balls", balls))?;
        }
        Ok(())
    }

    fn mechanical_eject_started(&mut self, world: &mut World) -> Result<(), MachineError> {
        let Some(target) = self.manual_eject_target else {
            return Ok(());
        };
        debug!(device = %self.name, to = %world.targets.name(target), "Mechanical eject started");

        self.eject_in_progress_target = Some(target);
        self.eject_queue.clear();
        self.balls = 0;
        self.num_balls_ejecting = 1;
        self.mechanical_eject_in_progress = 1;
        self.ball_did_leave = true;

        world.post(&self.event("mechanical_eject_attempt"), EventArgs::new().with("balls", 1))?;
        world.post_queue(
            &self.event("ball_eject_attempt"),
            EventArgs::new()
                .with("balls", 1)
                .with("target", world.targets.name(target))
                .with("timeout", 0)
                .with("num_attempts", 0),
            self.handler(Action::MechanicalEjectCallback),
        )?;
        world.events.remove_handler(&self.handler(Action::EjectSuccess));
        self.setup_eject_confirmation(target, 0, world)
    }

    fn mechanical_eject_failed(&mut self, world: &mut World) -> Result<(), MachineError> {
        let Some(target) = self.eject_in_progress_target.take() else {
            return Ok(());
        };
        debug!(device = %self.name, "Mechanical eject failed");
        self.eject_queue.push_front((target, self.timeout_for(target)));

        world.post(
            &self.event("mechanical_eject_failed"),
            EventArgs::new()
                .with("target", world.targets.name(target))
                .with("balls", self.num_balls_ejecting)
                .with("num_attempts", self.num_eject_attempts),
        )?;

        self.num_balls_ejecting = 0;
        self.num_eject_attempts += 1;
        self.mechanical_eject_in_progress = 0;
        self.remove_confirmation_handlers(world);
        Ok(())
    }

    fn entrance_switch_hit(&mut self, world: &mut World) -> Result<(), MachineError> {
        if !self.config.ball_switches.is_empty() {
            return Ok(());
        }
        if self.is_full(world) {
            warn!(device = %self.name, balls = self.balls, "Device received a ball but is already full, ignoring");
            return Ok(());
        }
        self.balls += 1;
        self.balls_added(1, world)
    }

    /// Asks eject sources for balls; `None` fills the device.
    ///
    /// Returns how many balls were requested.
    pub(crate) fn request_ball(&mut self, balls: Option<u32>, world: &mut World) -> Result<u32, MachineError> {
        if self.eject_in_progress_target.is_some() {
            debug!(device = %self.name, "Can't request a ball during an eject");
            return Ok(0);
        }
        if self.additional_capacity() == 0 {
            debug!(device = %self.name, "Can't request a ball, not ok to receive");
            return Ok(0);
        }

        let remaining = self
            .config
            .capacity
            .saturating_sub(self.balls)
            .saturating_sub(self.num_balls_requested);
        let balls = balls.map_or(remaining, |b| b.min(remaining));
        if balls == 0 {
            return Ok(0);
        }

        self.num_balls_requested += balls;
        debug!(device = %self.name, balls, "Requesting balls");
        world.post(&self.event("ball_request"), EventArgs::new().with("balls", balls))?;
        Ok(balls)
    }

    fn requested_ball_received(&mut self, args: &EventArgs, world: &mut World) -> EventArgs {
        let balls = args.get_u32("balls").unwrap_or(0);
        let unexpected = balls.saturating_sub(self.num_balls_in_transit);

        self.num_balls_requested = self.num_balls_requested.saturating_sub(balls);
        self.num_balls_in_transit = self.num_balls_in_transit.saturating_sub(balls);
        if self.num_balls_in_transit == 0 {
            world.events.remove_handler(&self.handler(Action::RequestedBallReceived));
        }
        EventArgs::new().with("balls", unexpected)
    }

    /// Cancels pending ejects and confirmations, then recounts.
    pub(crate) fn stop(&mut self, world: &mut World) -> Result<(), MachineError> {
        debug!(device = %self.name, "Stopping all activity");
        self.eject_in_progress_target = None;
        self.eject_queue.clear();
        self.num_jam_switch_count = 0;
        self.cancel_eject_confirmation(true, world);
        self.count_balls(world)?;
        Ok(())
    }

    /// Ejects now when nothing has to trigger it, otherwise waits for `trigger_event`,
    /// an eject event or the player's mechanical eject.
    pub(crate) fn setup_player_controlled_eject(
        &mut self,
        balls: u32,
        target: Option<Target>,
        trigger_event: Option<&str>,
        world: &mut World,
    ) -> Result<bool, MachineError> {
        if balls < 1 {
            warn!(device = %self.name, balls, "Ignoring player-controlled eject of no balls");
            return Ok(false);
        }
        let target = match target {
            Some(target) => target,
            None => self.default_target()?,
        };
        debug!(device = %self.name, balls, to = %world.targets.name(target), trigger_event, "Setting up player-controlled eject");

        self.waiting_for_eject_trigger = true;
        if let Some(event) = trigger_event {
            let handler = self.handler(Action::EjectTrigger);
            if !world.events.has_handler(event, &handler) {
                self.pending_eject_event_keys.push(world.add_handler(event, handler, 1));
            }
        }
        if self.config.mechanical_eject {
            self.manual_eject_target = Some(target);
        }

        if !self.config.mechanical_eject && self.config.eject_events.is_empty() {
            self.waiting_for_eject_trigger = false;
            self.manual_eject_target = None;
            self.mechanical_eject_in_progress = 0;
            return self.eject(balls, Some(target), None, true, world);
        }

        if balls > self.balls {
            self.request_ball(Some(balls - self.balls), world)?;
            self.mechanical_eject_in_progress = balls;
        }
        Ok(true)
    }

    /// Queues `balls` ejects to `target` (default: the first eject target).
    ///
    /// Without `get_ball` only held balls are queued. A `timeout` of `None` uses the
    /// configured timeout for the target; zero means no timeout.
    pub(crate) fn eject(
        &mut self,
        balls: u32,
        target: Option<Target>,
        timeout: Option<u64>,
        get_ball: bool,
        world: &mut World,
    ) -> Result<bool, MachineError> {
        if balls < 1 {
            warn!(device = %self.name, balls, "Ignoring eject of no balls");
            return Ok(false);
        }
        let target = match target {
            Some(target) => target,
            None => self.default_target()?,
        };
        let timeout = timeout.unwrap_or_else(|| self.timeout_for(target));
        let queued = if balls > self.balls && !get_ball { self.balls } else { balls };
        debug!(device = %self.name, balls = queued, to = %world.targets.name(target), timeout, get_ball, "Queueing eject");

        for _ in 0..queued {
            self.eject_queue.push_back((target, timeout));
        }
        self.do_eject(world)?;
        Ok(true)
    }

    /// Ejects every held ball. Returns `false` when the device is empty.
    pub(crate) fn eject_all(&mut self, target: Option<Target>, world: &mut World) -> Result<bool, MachineError> {
        if self.balls == 0 {
            return Ok(false);
        }
        self.eject(self.balls, target, None, false, world)
    }

    fn do_eject(&mut self, world: &mut World) -> Result<bool, MachineError> {
        let Some(&(target, timeout)) = self.eject_queue.front() else {
            return Ok(false);
        };
        if self.eject_in_progress_target.is_some() {
            return Ok(false);
        }

        if self.balls == 0 {
            if self.num_balls_requested == 0 {
                debug!(device = %self.name, "No balls to eject, requesting one");
                self.request_ball(Some(1), world)?;
            }
            return Ok(false);
        }

        if world.targets.capacity(target) == 0 {
            debug!(device = %self.name, to = %world.targets.name(target), "Target can't receive, eject waits");
            return Ok(false);
        }

        self.eject_queue.pop_front();
        self.eject_in_progress_target = Some(target);
        self.num_eject_attempts += 1;

        if let Some(jam) = &self.config.jam_switch {
            self.num_jam_switch_count = u32::from(world.is_active(jam, 0));
        }
        self.num_balls_ejecting = if self.config.balls_per_eject == 1 {
            1
        } else {
            self.balls + self.mechanical_eject_in_progress
        };

        debug!(device = %self.name, to = %world.targets.name(target), timeout,
            attempt = self.num_eject_attempts, balls = self.num_balls_ejecting, "Ejecting");
        world.post_queue(
            &self.event("ball_eject_attempt"),
            EventArgs::new()
                .with("balls", self.num_balls_ejecting)
                .with("target", world.targets.name(target))
                .with("timeout", timeout)
                .with("num_attempts", self.num_eject_attempts),
            self.handler(Action::PerformEject),
        )?;
        Ok(true)
    }

    fn perform_eject(&mut self, args: &EventArgs, world: &mut World) -> Result<(), MachineError> {
        let Some(target) = self.eject_in_progress_target else {
            warn!(device = %self.name, "Eject callback without an eject in progress");
            return Ok(());
        };
        let timeout = args.get_u64("timeout").unwrap_or(0);
        self.setup_eject_confirmation(target, timeout, world)?;
        self.ball_did_leave = false;

        if self.config.ball_switches.is_empty() {
            // Nothing can see it leave.
            self.balls = self.balls.saturating_sub(self.num_balls_ejecting);
            self.ball_did_leave = true;
        } else {
            for switch in &self.config.ball_switches {
                if world.is_active(switch, self.config.entrance_count_delay) {
                    world.switches.add_handler(switch, false, 0, self.handler(Action::BallLeft))?;
                }
            }
        }

        if let Some(coil) = &self.config.eject_coil {
            debug!(device = %self.name, coil = %coil, balls = self.balls, "Firing eject coil");
            world.drivers.pulse(coil)?;
        } else if let Some(coil) = &self.config.hold_coil {
            debug!(device = %self.name, coil = %coil, balls = self.balls, "Releasing hold coil");
            world.drivers.disable(coil)?;
            self.hold_release_in_progress = true;
            world.delay(HOLD_COIL_RELEASE, self.config.hold_coil_release_time, self.handler(Action::HoldReleaseDone));
        }
        Ok(())
    }

    fn ball_left(&mut self, world: &mut World) {
        self.balls = self.balls.saturating_sub(self.num_balls_ejecting);
        self.ball_did_leave = true;
        debug!(device = %self.name, balls = self.balls, "Ball left device");
        world.switches.remove_handler_everywhere(self.handler(Action::BallLeft));
    }

    fn hold(&self, world: &mut World) -> Result<(), MachineError> {
        if self.hold_release_in_progress {
            return Ok(());
        }
        if let Some(coil) = &self.config.hold_coil {
            world.drivers.enable(coil)?;
        }
        Ok(())
    }

    fn hold_release_done(&mut self, world: &mut World) -> Result<(), MachineError> {
        self.hold_release_in_progress = false;
        if self.balls > 0 {
            self.hold(world)?;
        }
        Ok(())
    }

    fn setup_eject_confirmation(&mut self, target: Target, timeout: u64, world: &mut World) -> Result<(), MachineError> {
        self.confirm_via_count = false;
        let success = self.handler(Action::EjectSuccess);

        match &self.config.confirm {
            ConfirmEject::Target => {
                let status = world.targets.get(target).cloned();
                let name = status.as_ref().map_or_else(String::new, |s| s.name.clone());
                if let Some(status) = status.filter(|s| s.is_playfield) {
                    self.confirm_via_count = true;
                    if status.ok_to_confirm_via_switch {
                        world.add_handler(&format!("sw_{name}_active"), success, 1);
                    }
                }
                if timeout > 0 {
                    world.delay(CONFIRM_TIMEOUT, timeout, self.handler(Action::EjectTimeout));
                }
                debug!(device = %self.name, to = %name, timeout, "Confirming eject via target entry");
                world.add_handler(&format!("balldevice_{name}_ball_enter"), success, TARGET_ENTER_PRIORITY);
            },
            ConfirmEject::Switch(switch) => {
                world.switches.add_handler(switch, true, 0, success)?;
            },
            ConfirmEject::Event(event) => {
                world.add_handler(event, success, 1);
            },
            ConfirmEject::Count => self.confirm_via_count = true,
            ConfirmEject::Fake => world.delay(CONFIRM_TIMEOUT, 1, success),
        }
        Ok(())
    }

    fn remove_confirmation_handlers(&self, world: &mut World) {
        let success = self.handler(Action::EjectSuccess);
        world.events.remove_handler(&success);
        world.switches.remove_handler_everywhere(success);
        world.cancel_delay(self.key(), CONFIRM_TIMEOUT);
    }

    /// Attempts only reset after a success or a stop, so retries can run out.
    fn cancel_eject_confirmation(&mut self, reset_attempts: bool, world: &mut World) {
        self.eject_in_progress_target = None;
        if reset_attempts {
            self.num_eject_attempts = 0;
        }
        self.remove_confirmation_handlers(world);
        world.events.remove_handlers_by_keys(self.pending_eject_event_keys.drain(..));
        world.switches.remove_handler_everywhere(self.handler(Action::BallLeft));

        self.manual_eject_target = None;
        self.waiting_for_eject_trigger = false;
        self.mechanical_eject_in_progress = 0;
    }

    fn eject_success(&mut self, world: &mut World) -> Result<(), MachineError> {
        self.confirm_via_count = false;

        if let Some(target) = self.eject_in_progress_target.take() {
            let balls = self.num_balls_ejecting;
            self.num_jam_switch_count = 0;
            self.num_balls_ejecting = 0;
            debug!(device = %self.name, to = %world.targets.name(target), balls, "Eject confirmed");
            world.post(
                &self.event("ball_eject_success"),
                EventArgs::new().with("balls", balls).with("target", world.targets.name(target)),
            )?;
        } else {
            warn!(device = %self.name, "Eject success without an eject in progress");
        }
        self.cancel_eject_confirmation(true, world);

        if !self.eject_queue.is_empty() {
            self.do_eject(world)?;
        } else {
            let capacity = self.additional_capacity();
            if capacity > 0 {
                world.post(&self.event("ok_to_receive"), EventArgs::new().with("balls", capacity))?;
            }
        }
        Ok(())
    }

    /// Marks the eject in progress as failed and retries it when attempts remain.
    pub(crate) fn eject_failed(&mut self, retry: bool, force_retry: bool, world: &mut World) -> Result<(), MachineError> {
        let Some(target) = self.eject_in_progress_target.take() else {
            warn!(device = %self.name, "Eject failure without an eject in progress, ignoring");
            return Ok(());
        };
        self.eject_queue.push_front((target, self.timeout_for(target)));
        let balls = self.num_balls_ejecting;
        self.num_balls_ejecting = 0;

        if !self.ball_did_leave {
            warn!(device = %self.name, "Ball did not leave device during eject");
        }
        debug!(device = %self.name, to = %world.targets.name(target), attempt = self.num_eject_attempts, "Eject failed");
        world.post(
            &self.event("ball_eject_failed"),
            EventArgs::new()
                .with("target", world.targets.name(target))
                .with("balls", balls)
                .with("num_attempts", self.num_eject_attempts),
        )?;
        self.cancel_eject_confirmation(false, world);

        let attempts_left = self.config.max_eject_attempts == 0
            || self.num_eject_attempts < self.config.max_eject_attempts;
        if (retry && attempts_left) || force_retry {
            self.do_eject(world)?;
        } else {
            warn!(device = %self.name, attempts = self.num_eject_attempts, "Eject permanently failed");
            self.num_eject_attempts = 0;
            world.post(&self.event("ball_eject_permanent_failure"), EventArgs::new())?;
        }
        Ok(())
    }

    fn status_dump(&self) {
        debug!(
            device = %self.name,
            balls = self.balls,
            eject_in_progress = self.eject_in_progress_target.is_some(),
            ejecting = self.num_balls_ejecting,
            jam_count = self.num_jam_switch_count,
            attempts = self.num_eject_attempts,
            requested = self.num_balls_requested,
            queue = self.eject_queue.len(),
            manual_target = self.manual_eject_target.is_some(),
            mechanical = self.mechanical_eject_in_progress,
            "Ball device status"
        );
    }
}
