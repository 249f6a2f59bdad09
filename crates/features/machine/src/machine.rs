use crate::delays::DelayManager;
use crate::devices::{
    BALL_DEVICES, BallDevice, BallDeviceStatus, BallSave, Directory, DriverEnabled, Flipper, Mode, PLAYFIELDS,
    Playfield, owned,
};
use crate::drivers::{DriverBank, DriverPlatform, VirtualPlatform};
use crate::error::MachineError;
use crate::handler::{BallDeviceAction, Handler, PlayfieldAction, Target};
use crate::switches::SwitchController;
use crate::world::{Command, TargetBoard, TargetStatus, World};
use pinrig_domain::MachineConfig;
use pinrig_events::{EventArgs, EventBus, PostKind, PostedEvent};
use pinrig_kernel::timing::{DEFAULT_HZ, tick_ms};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

const BOOT_EVENTS: [&str; 5] = [
    "init_phase_1",
    "init_phase_2",
    "machine_reset_phase_1",
    "machine_reset_phase_2",
    "machine_reset_phase_3",
];
const BALL_ADD_LIVE: &str = "ball_add_live";

/// Builds a [`Machine`] from a validated config.
#[derive(Debug, Default)]
pub struct MachineBuilder<'a> {
    config: Option<&'a MachineConfig>,
    platform: Option<Box<dyn DriverPlatform>>,
    tap_capacity: Option<usize>,
    max_queue: Option<usize>,
    balls_known: Option<u32>,
}

impl<'a> MachineBuilder<'a> {
    #[must_use]
    pub const fn config(mut self, config: &'a MachineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Driver output; defaults to a fresh [`VirtualPlatform`].
    #[must_use]
    pub fn platform(mut self, platform: Box<dyn DriverPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    #[must_use]
    pub const fn tap_capacity(mut self, capacity: usize) -> Self {
        self.tap_capacity = Some(capacity);
        self
    }

    #[must_use]
    pub const fn max_queue(mut self, max: usize) -> Self {
        self.max_queue = Some(max);
        self
    }

    /// Fixes the number of balls in the machine instead of counting them at start.
    #[must_use]
    pub const fn balls_known(mut self, balls: u32) -> Self {
        self.balls_known = Some(balls);
        self
    }

    /// # Errors
    /// A missing config, an invalid event bus bound, or device settings the runtime
    /// can't use (unknown eject targets, confirmation without its switch or event).
    pub fn build(self) -> Result<Machine, MachineError> {
        let config = self.config.ok_or("machine builder needs a config")?;

        let mut events = match self.tap_capacity {
            Some(capacity) => EventBus::with_tap_capacity(capacity)?,
            None => EventBus::new(),
        };
        if let Some(max) = self.max_queue {
            events.set_max_queue(max)?;
        }
        let hz = config
            .singleton("timing")
            .and_then(|timing| timing.int("hz"))
            .and_then(|hz| u64::try_from(hz).ok())
            .unwrap_or(DEFAULT_HZ);
        let platform = self.platform.unwrap_or_else(|| Box::new(VirtualPlatform::new()));

        let directory = Directory::from_config(config);
        let mut playfields: Vec<Playfield> = config
            .entries(PLAYFIELDS)
            .enumerate()
            .map(|(i, (name, settings))| Playfield::new(i, name, owned(settings, "tags")))
            .collect();
        let mut ball_devices = config
            .entries(BALL_DEVICES)
            .enumerate()
            .map(|(i, (name, settings))| BallDevice::from_settings(i, name, settings, &directory))
            .collect::<Result<Vec<_>, _>>()?;

        let sources_of = |target: Target| -> Vec<String> {
            ball_devices
                .iter()
                .filter(|device| device.eject_targets().any(|t| t == target))
                .map(|device| device.name().to_owned())
                .collect()
        };
        let device_sources: Vec<_> = (0..ball_devices.len()).map(|i| sources_of(Target::BallDevice(i))).collect();
        let playfield_sources: Vec<_> = (0..playfields.len()).map(|i| sources_of(Target::Playfield(i))).collect();
        for (device, sources) in ball_devices.iter_mut().zip(device_sources) {
            device.set_sources(sources);
        }
        for (playfield, sources) in playfields.iter_mut().zip(playfield_sources) {
            playfield.set_sources(sources);
        }

        let ball_saves = config
            .entries("ball_saves")
            .enumerate()
            .map(|(i, (name, settings))| {
                let source = settings.reference("source_playfield").unwrap_or("playfield");
                let playfield = directory.playfield(source).ok_or_else(|| MachineError::UnknownDevice {
                    kind: "playfield",
                    name: source.to_owned(),
                    context: Some(format!("ball_saves.{name}.source_playfield").into()),
                })?;
                Ok(BallSave::from_settings(i, name, settings, playfield))
            })
            .collect::<Result<Vec<_>, MachineError>>()?;
        let driver_enabled = config
            .entries("driver_enabled")
            .enumerate()
            .map(|(i, (name, settings))| DriverEnabled::from_settings(i, name, settings))
            .collect();
        let flippers = config
            .entries("flippers")
            .enumerate()
            .map(|(i, (name, settings))| Flipper::from_settings(i, name, settings))
            .collect();
        let modes = config
            .entries("modes")
            .enumerate()
            .map(|(i, (name, settings))| Mode::from_settings(i, name, settings))
            .collect();

        let world = World {
            now: 0,
            events,
            delays: DelayManager::new(),
            switches: SwitchController::from_config(config),
            drivers: DriverBank::from_config(config, platform),
            targets: TargetBoard::default(),
            commands: Vec::new(),
            balls_known: self.balls_known.unwrap_or(0),
            balls_in_play: 0,
        };

        let mut machine = Machine {
            world,
            hz,
            directory,
            ball_devices,
            playfields,
            ball_saves,
            driver_enabled,
            flippers,
            modes,
            balls_known: self.balls_known,
            started: false,
        };
        machine.register_handlers();
        machine.refresh_targets();
        debug!(
            hz,
            ball_devices = machine.ball_devices.len(),
            playfields = machine.playfields.len(),
            switches = machine.world.switches.iter().count(),
            "Machine built"
        );
        Ok(machine)
    }
}

/// The running machine: devices plus the services they share, advanced explicitly.
///
/// Nothing here runs on its own. Callers feed switch changes and posted events, then
/// move the clock with [`Machine::advance`]. Every call drains the event queue before
/// returning, so state is settled between calls.
#[derive(Debug)]
pub struct Machine {
    world: World,
    hz: u64,
    directory: Directory,
    ball_devices: Vec<BallDevice>,
    playfields: Vec<Playfield>,
    ball_saves: Vec<BallSave>,
    driver_enabled: Vec<DriverEnabled>,
    flippers: Vec<Flipper>,
    modes: Vec<Mode>,
    balls_known: Option<u32>,
    started: bool,
}

impl Machine {
    #[must_use]
    pub fn builder<'a>() -> MachineBuilder<'a> {
        MachineBuilder::default()
    }

    fn register_handlers(&mut self) {
        for i in 0..self.ball_devices.len() {
            self.world.add_handler(
                "machine_reset_phase_1",
                Handler::BallDevice(i, BallDeviceAction::Initialize),
                1,
            );
            self.world.add_handler(
                "machine_reset_phase_2",
                Handler::BallDevice(i, BallDeviceAction::WatchSources),
                1,
            );
        }
        for i in 0..self.playfields.len() {
            self.world.add_handler("machine_reset_phase_2", Handler::Playfield(i, PlayfieldAction::WatchSources), 1);
        }
        for save in &self.ball_saves {
            save.register(&mut self.world);
        }
        for device in &self.driver_enabled {
            device.register(&mut self.world);
        }
        for flipper in &self.flippers {
            flipper.register(&mut self.world);
        }
        for mode in &self.modes {
            mode.register(&mut self.world);
        }
    }

    /// Runs the boot phases. Devices count their balls during the first reset phase.
    ///
    /// # Errors
    /// Any error raised by a device while booting.
    pub fn start(&mut self) -> Result<(), MachineError> {
        if self.started {
            return Ok(());
        }
        for event in BOOT_EVENTS {
            self.world.post(event, EventArgs::new())?;
            self.process_events()?;
        }
        self.world.balls_known = self.balls_known.unwrap_or_else(|| self.ball_devices.iter().map(BallDevice::balls).sum());
        self.started = true;
        info!(balls_known = self.world.balls_known, "Machine started");
        Ok(())
    }

    #[must_use]
    pub const fn now(&self) -> u64 {
        self.world.now
    }

    #[must_use]
    pub const fn hz(&self) -> u64 {
        self.hz
    }

    /// Subscribes to every event posted from now on.
    #[must_use]
    pub fn tap(&self) -> broadcast::Receiver<Arc<PostedEvent>> {
        self.world.events.tap()
    }

    /// # Errors
    /// A full event queue, or an error raised by a handler.
    pub fn post(&mut self, event: &str, args: EventArgs) -> Result<(), MachineError> {
        self.world.post(event, args)?;
        self.process_events()
    }

    /// # Errors
    /// A full event queue, or an error raised by a handler.
    pub fn post_relay(&mut self, event: &str, args: EventArgs) -> Result<(), MachineError> {
        self.world.post_relay(event, args, None)?;
        self.process_events()
    }

    /// Sets a switch's logical state and runs whatever it triggers.
    ///
    /// # Errors
    /// An unknown switch, or an error raised by a handler.
    pub fn switch(&mut self, name: &str, active: bool) -> Result<(), MachineError> {
        let Some(change) = self.world.switches.set_state(name, active, self.world.now)? else {
            return Ok(());
        };
        for handler in change.immediate {
            // An earlier handler may have removed this one.
            if self.world.switches.has_handler(name, active, handler) {
                self.call(handler, &EventArgs::new())?;
            }
        }
        for event in change.events {
            self.world.post(&event, EventArgs::new())?;
        }
        self.process_events()
    }

    /// Applies a raw hardware reading by switch number.
    ///
    /// # Errors
    /// A number no switch is wired to, or an error raised by a handler.
    pub fn hw_switch(&mut self, number: &str, raw: bool) -> Result<(), MachineError> {
        let name = self
            .world
            .switches
            .name_for_number(number)
            .ok_or_else(|| MachineError::unknown("switch number", number))?
            .to_owned();
        let active = self.world.switches.logical_state(&name, raw).unwrap_or(raw);
        self.switch(&name, active)
    }

    /// Sets a switch state as if it had always been so. Use before [`Machine::start`].
    ///
    /// # Errors
    /// An unknown switch.
    pub fn set_initial_switch(&mut self, name: &str, active: bool) -> Result<(), MachineError> {
        self.world.switches.set_initial(name, active)
    }

    /// Moves the clock forward `ms`, one tick at a time, firing what falls due.
    ///
    /// # Errors
    /// Any error raised by a handler.
    pub fn advance(&mut self, ms: u64) -> Result<(), MachineError> {
        let step = tick_ms(self.hz);
        let end = self.world.now.saturating_add(ms);
        while self.world.now < end {
            self.world.now = self.world.now.saturating_add(step).min(end);
            self.run_due()?;
        }
        Ok(())
    }

    /// Fires due switch timers and delays, earliest first. Switch timers win ties.
    fn run_due(&mut self) -> Result<(), MachineError> {
        let now = self.world.now;
        loop {
            let switch = self.world.switches.next_due().filter(|&due| due <= now);
            let delay = self.world.delays.next_due().filter(|&due| due <= now);
            let due = match (switch, delay) {
                (Some(s), Some(d)) if d < s => self.world.delays.pop_due(now),
                (Some(_), _) => self.world.switches.pop_due(now),
                (None, Some(_)) => self.world.delays.pop_due(now),
                (None, None) => return Ok(()),
            };
            if let Some((_, _, handler)) = due {
                self.call(handler, &EventArgs::new())?;
                self.process_events()?;
            }
        }
    }

    fn process_events(&mut self) -> Result<(), MachineError> {
        while let Some(dispatch) = self.world.events.pop() {
            let mut args = dispatch.args;
            for registration in dispatch.handlers {
                if !self.world.events.is_registered(registration.key) {
                    continue;
                }
                let replaced = self.call(registration.handler, &args)?;
                if let (PostKind::Relay, Some(replaced)) = (dispatch.kind, replaced) {
                    args.merge(replaced);
                }
            }
            if let Some(callback) = dispatch.callback {
                self.call(callback, &args)?;
            }
        }
        Ok(())
    }

    fn call(&mut self, handler: Handler, args: &EventArgs) -> Result<Option<EventArgs>, MachineError> {
        let world = &mut self.world;
        let replaced = match handler {
            Handler::BallDevice(i, action) => slot(&mut self.ball_devices, i)?.handle(action, args, world)?,
            Handler::Playfield(i, action) => slot(&mut self.playfields, i)?.handle(action, args, world)?,
            Handler::BallSave(i, action) => slot(&mut self.ball_saves, i)?.handle(action, args, world)?,
            Handler::DriverEnabled(i, action) => slot(&mut self.driver_enabled, i)?.handle(action, world)?,
            Handler::Flipper(i, action) => slot(&mut self.flippers, i)?.handle(action, world)?,
            Handler::Mode(i, action) => slot(&mut self.modes, i)?.handle(action, world)?,
        };
        self.apply_commands()?;
        self.refresh_targets();
        Ok(replaced)
    }

    fn apply_commands(&mut self) -> Result<(), MachineError> {
        while !self.world.commands.is_empty() {
            for command in std::mem::take(&mut self.world.commands) {
                match command {
                    Command::AddBall { playfield, balls, player_controlled } => {
                        self.playfield_add_ball(playfield, balls, None, player_controlled)?;
                    },
                    Command::DriverEnabledCascade { coil, enabled } => {
                        for device in self.driver_enabled.iter_mut().filter(|d| d.driver() == coil) {
                            device.set_enabled(enabled);
                        }
                    },
                }
            }
        }
        Ok(())
    }

    fn refresh_targets(&mut self) {
        for (i, playfield) in self.playfields.iter().enumerate() {
            self.world.targets.publish(Target::Playfield(i), playfield.status());
        }
        for (i, device) in self.ball_devices.iter().enumerate() {
            self.world.targets.publish(
                Target::BallDevice(i),
                TargetStatus {
                    name: device.name().to_owned(),
                    is_playfield: false,
                    capacity: device.additional_capacity(),
                    ok_to_confirm_via_switch: false,
                },
            );
        }
    }

    fn playfield_add_ball(
        &mut self,
        playfield: usize,
        balls: u32,
        source: Option<&str>,
        player_controlled: bool,
    ) -> Result<bool, MachineError> {
        let name = slot(&mut self.playfields, playfield)?.name().to_owned();
        if balls < 1 {
            return Err(MachineError::invalid(format!("playfields.{name}"), "add_ball needs at least one ball"));
        }
        let source = match source {
            Some(device) => self.device_index(device)?,
            None => self.ball_devices.iter().position(|d| d.has_tag(BALL_ADD_LIVE)).ok_or_else(|| {
                MachineError::invalid(format!("playfields.{name}"), "no ball device tagged ball_add_live")
            })?,
        };
        debug!(playfield = %name, balls, source = %self.ball_devices[source].name(), player_controlled, "Adding balls");

        let target = Some(Target::Playfield(playfield));
        let world = &mut self.world;
        let device = &mut self.ball_devices[source];
        if player_controlled {
            device.setup_player_controlled_eject(balls, target, None, world)
        } else {
            device.eject(balls, target, None, true, world)
        }
    }

    fn device_index(&self, name: &str) -> Result<usize, MachineError> {
        self.directory.ball_device(name).ok_or_else(|| MachineError::unknown("ball device", name))
    }

    fn target(&self, name: Option<&str>) -> Result<Option<Target>, MachineError> {
        name.map(|name| self.directory.target(name).ok_or_else(|| MachineError::unknown("eject target", name)))
            .transpose()
    }

    /// Runs `f` on a ball device, then settles the machine.
    fn with_device<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut BallDevice, &mut World) -> Result<R, MachineError>,
    ) -> Result<R, MachineError> {
        let index = self.device_index(name)?;
        let result = f(&mut self.ball_devices[index], &mut self.world)?;
        self.apply_commands()?;
        self.refresh_targets();
        self.process_events()?;
        Ok(result)
    }

    /// Queues `balls` ejects from `device` to `target` (default: its first eject target).
    ///
    /// # Errors
    /// An unknown device or target, or an error raised while ejecting.
    pub fn eject(&mut self, device: &str, balls: u32, target: Option<&str>) -> Result<bool, MachineError> {
        let target = self.target(target)?;
        self.with_device(device, |d, world| d.eject(balls, target, None, false, world))
    }

    /// # Errors
    /// An unknown device or target, or an error raised while ejecting.
    pub fn eject_all(&mut self, device: &str, target: Option<&str>) -> Result<bool, MachineError> {
        let target = self.target(target)?;
        self.with_device(device, |d, world| d.eject_all(target, world))
    }

    /// Asks the sources of `device` for balls; `None` fills it. Returns the number requested.
    ///
    /// # Errors
    /// An unknown device, or an error raised while posting the request.
    pub fn request_ball(&mut self, device: &str, balls: Option<u32>) -> Result<u32, MachineError> {
        self.with_device(device, |d, world| d.request_ball(balls, world))
    }

    /// # Errors
    /// An unknown device, or an error raised while recounting.
    pub fn stop_device(&mut self, device: &str) -> Result<(), MachineError> {
        self.with_device(device, |d, world| d.stop(world))
    }

    /// # Errors
    /// An unknown device or target, or an error raised while ejecting.
    pub fn setup_player_controlled_eject(
        &mut self,
        device: &str,
        balls: u32,
        target: Option<&str>,
        trigger_event: Option<&str>,
    ) -> Result<bool, MachineError> {
        let target = self.target(target)?;
        self.with_device(device, |d, world| d.setup_player_controlled_eject(balls, target, trigger_event, world))
    }

    /// Adds balls to a playfield from `source`, or from the first device tagged
    /// `ball_add_live`.
    ///
    /// # Errors
    /// An unknown playfield or source, no `ball_add_live` device, or an error raised
    /// while ejecting.
    pub fn add_ball(
        &mut self,
        playfield: &str,
        balls: u32,
        source: Option<&str>,
        player_controlled: bool,
    ) -> Result<bool, MachineError> {
        let index = self.directory.playfield(playfield).ok_or_else(|| MachineError::unknown("playfield", playfield))?;
        let added = self.playfield_add_ball(index, balls, source, player_controlled)?;
        self.apply_commands()?;
        self.refresh_targets();
        self.process_events()?;
        Ok(added)
    }

    pub fn set_balls_in_play(&mut self, balls: u32) {
        self.world.balls_in_play = balls;
    }

    #[must_use]
    pub const fn balls_in_play(&self) -> u32 {
        self.world.balls_in_play
    }

    pub fn set_num_balls_known(&mut self, balls: u32) {
        self.balls_known = Some(balls);
        self.world.balls_known = balls;
    }

    #[must_use]
    pub const fn num_balls_known(&self) -> u32 {
        self.world.balls_known
    }

    #[must_use]
    pub fn ball_device(&self, name: &str) -> Option<&BallDevice> {
        self.directory.ball_device(name).map(|i| &self.ball_devices[i])
    }

    pub fn ball_devices(&self) -> impl Iterator<Item = &BallDevice> {
        self.ball_devices.iter()
    }

    #[must_use]
    pub fn ball_device_status(&self, name: &str) -> Option<BallDeviceStatus> {
        self.ball_device(name).map(|device| device.status(&self.world.targets))
    }

    #[must_use]
    pub fn playfield(&self, name: &str) -> Option<&Playfield> {
        self.directory.playfield(name).map(|i| &self.playfields[i])
    }

    #[must_use]
    pub fn ball_save(&self, name: &str) -> Option<&BallSave> {
        self.ball_saves.iter().find(|s| s.name() == name)
    }

    #[must_use]
    pub fn driver_enabled(&self, name: &str) -> Option<&DriverEnabled> {
        self.driver_enabled.iter().find(|d| d.name() == name)
    }

    #[must_use]
    pub fn flipper(&self, name: &str) -> Option<&Flipper> {
        self.flippers.iter().find(|f| f.name() == name)
    }

    #[must_use]
    pub fn mode(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|m| m.name() == name)
    }

    /// Names of active modes, highest priority first.
    #[must_use]
    pub fn active_modes(&self) -> Vec<&str> {
        let mut active: Vec<&Mode> = self.modes.iter().filter(|m| m.active()).collect();
        active.sort_by_key(|m| std::cmp::Reverse(m.priority()));
        active.into_iter().map(Mode::name).collect()
    }

    #[must_use]
    pub const fn switches(&self) -> &SwitchController {
        &self.world.switches
    }

    #[must_use]
    pub const fn drivers(&self) -> &DriverBank {
        &self.world.drivers
    }

    #[must_use]
    pub const fn targets(&self) -> &TargetBoard {
        &self.world.targets
    }
}

fn slot<T>(devices: &mut [T], index: usize) -> Result<&mut T, MachineError> {
    devices.get_mut(index).ok_or_else(|| MachineError::from(format!("no device at index {index}")))
}
