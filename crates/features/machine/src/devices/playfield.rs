use crate::error::MachineError;
use crate::handler::{Handler, PlayfieldAction as Action};
use crate::world::{TargetStatus, World};
use pinrig_events::EventArgs;
use tracing::{debug, warn};

/// The open playfield: an eject target with unlimited capacity that tracks balls in
/// play by watching the devices that eject onto it.
#[derive(Debug)]
pub struct Playfield {
    index: usize,
    name: String,
    tags: Vec<String>,
    balls: i64,
    incoming: u32,
    sources: Vec<String>,
}

impl Playfield {
    pub(crate) fn new(index: usize, name: &str, tags: Vec<String>) -> Self {
        Self { index, name: name.to_owned(), tags, balls: 0, incoming: 0, sources: Vec::new() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Balls on the playfield. Goes negative when a drain arrives before the eject
    /// that fed it was confirmed.
    #[must_use]
    pub const fn balls(&self) -> i64 {
        self.balls
    }

    #[must_use]
    pub const fn incoming(&self) -> u32 {
        self.incoming
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub(crate) fn set_sources(&mut self, sources: Vec<String>) {
        self.sources = sources;
    }

    /// A switch hit confirms an eject only when this ball is the only one in motion.
    #[must_use]
    pub const fn ok_to_confirm_via_switch(&self) -> bool {
        self.balls == 0 && self.incoming <= 1
    }

    pub(crate) fn status(&self) -> TargetStatus {
        TargetStatus {
            name: self.name.clone(),
            is_playfield: true,
            capacity: u32::MAX,
            ok_to_confirm_via_switch: self.ok_to_confirm_via_switch(),
        }
    }

    const fn handler(&self, action: Action) -> Handler {
        Handler::Playfield(self.index, action)
    }

    pub(crate) fn handle(
        &mut self,
        action: Action,
        args: &EventArgs,
        world: &mut World,
    ) -> Result<Option<EventArgs>, MachineError> {
        let for_me = args.get_str("target") == Some(self.name.as_str());
        let balls = args.get_u32("balls").unwrap_or(1);
        match action {
            Action::WatchSources => self.watch_sources(world),
            Action::SourceEjectAttempt if for_me => {
                self.incoming += balls;
                debug!(playfield = %self.name, incoming = self.incoming, "Ball headed to playfield");
            },
            Action::SourceEjectSuccess if for_me => {
                self.incoming = self.incoming.saturating_sub(balls);
                self.balls += i64::from(balls);
                world.post(
                    &format!("{}_ball_count_change", self.name),
                    EventArgs::new().with("balls", self.balls).with("change", balls),
                )?;
            },
            Action::SourceEjectFailed if for_me => {
                self.incoming = self.incoming.saturating_sub(balls);
            },
            Action::Captured => {
                self.balls -= i64::from(balls);
                if self.balls < 0 {
                    warn!(playfield = %self.name, balls = self.balls, "Playfield ball count went negative");
                }
                debug!(playfield = %self.name, balls = self.balls, "Ball drained from playfield");
                world.post(
                    &format!("{}_ball_count_change", self.name),
                    EventArgs::new().with("balls", self.balls).with("change", -i64::from(balls)),
                )?;
                world.post_relay(
                    "ball_drain",
                    EventArgs::new().with("balls", balls).with("playfield", self.name.as_str()),
                    None,
                )?;
            },
            Action::SourceEjectAttempt | Action::SourceEjectSuccess | Action::SourceEjectFailed => {},
        }
        Ok(None)
    }

    fn watch_sources(&self, world: &mut World) {
        for source in &self.sources {
            world.add_handler(
                &format!("balldevice_{source}_ball_eject_attempt"),
                self.handler(Action::SourceEjectAttempt),
                1,
            );
            world.add_handler(
                &format!("balldevice_{source}_ball_eject_success"),
                self.handler(Action::SourceEjectSuccess),
                1,
            );
            for failed in ["ball_eject_failed", "mechanical_eject_failed"] {
                world.add_handler(
                    &format!("balldevice_{source}_{failed}"),
                    self.handler(Action::SourceEjectFailed),
                    1,
                );
            }
        }
        world.add_handler(
            &format!("balldevice_captured_from_{}", self.name),
            self.handler(Action::Captured),
            1,
        );
    }
}
