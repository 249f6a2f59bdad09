#![allow(dead_code)]

use pinrig_events::{EventArgs, EventReceiverExt, PostedEvent};
use pinrig_kernel::config::ConfigLoader;
use pinrig_kernel::domain::{MachineConfig, ValidationPasses};
use pinrig_kernel::validate_machine;
use pinrig_machine::{DriverAction, Machine, VirtualPlatform};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub fn config(yaml: &str) -> MachineConfig {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("machine.yaml");
    fs::write(&path, format!("#config_version=3\n{yaml}")).unwrap();
    let raw = ConfigLoader::new().file(&path).env_prefix(None).load().unwrap();
    validate_machine(&raw, ValidationPasses::ALL).unwrap()
}

/// A booted machine on the virtual platform with a tap on its events.
pub struct Rig {
    pub machine: Machine,
    pub platform: VirtualPlatform,
    tap: broadcast::Receiver<Arc<PostedEvent>>,
    seen: Vec<Arc<PostedEvent>>,
}

impl Rig {
    /// Builds from `yaml`, applies `initial` switch states, then starts.
    pub fn new(yaml: &str, initial: &[&str]) -> Self {
        let config = config(yaml);
        let platform = VirtualPlatform::new();
        let mut machine = Machine::builder()
            .config(&config)
            .platform(Box::new(platform.clone()))
            .tap_capacity(4096)
            .balls_known(99)
            .build()
            .unwrap();
        let tap = machine.tap();
        for switch in initial {
            machine.set_initial_switch(switch, true).unwrap();
        }
        machine.start().unwrap();
        Self { machine, platform, tap, seen: Vec::new() }
    }

    pub fn advance_time_and_run(&mut self, ms: u64) {
        self.machine.advance(ms).unwrap();
    }

    pub fn hit(&mut self, switch: &str) {
        self.machine.switch(switch, true).unwrap();
    }

    pub fn release(&mut self, switch: &str) {
        self.machine.switch(switch, false).unwrap();
    }

    pub fn post(&mut self, event: &str) {
        self.machine.post(event, EventArgs::new()).unwrap();
    }

    pub fn balls(&self, device: &str) -> u32 {
        self.machine.ball_device(device).unwrap().balls()
    }

    /// Names of every event posted so far, oldest first.
    pub fn events(&mut self) -> Vec<String> {
        self.seen.extend(self.tap.drain());
        self.seen.iter().map(|e| e.name.clone()).collect()
    }

    pub fn posted(&mut self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    /// Arguments of the latest post of `event`.
    pub fn args(&mut self, event: &str) -> Option<EventArgs> {
        self.seen.extend(self.tap.drain());
        self.seen.iter().rev().find(|e| e.name == event).map(|e| e.args.clone())
    }

    pub fn pulses(&self, coil: &str) -> usize {
        self.platform
            .actions_for(coil)
            .iter()
            .filter(|a| matches!(a, DriverAction::Pulse { .. }))
            .count()
    }
}
