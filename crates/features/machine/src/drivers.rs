use crate::error::MachineError;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use pinrig_domain::MachineConfig;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_PULSE_MS: u64 = 10;

/// A configured coil.
#[derive(Debug, Clone, Serialize)]
pub struct Coil {
    pub name: String,
    pub number: String,
    pub pulse_ms: u64,
    pub allow_enable: bool,
    pub enabled: bool,
}

/// Output side of a hardware platform.
pub trait DriverPlatform: Send + fmt::Debug {
    fn pulse(&mut self, coil: &Coil, ms: u64);
    fn enable(&mut self, coil: &Coil);
    fn disable(&mut self, coil: &Coil);
}

/// A recorded driver command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DriverAction {
    Pulse { coil: String, ms: u64 },
    Enable { coil: String },
    Disable { coil: String },
}

impl DriverAction {
    #[must_use]
    pub fn coil(&self) -> &str {
        match self {
            Self::Pulse { coil, .. } | Self::Enable { coil } | Self::Disable { coil } => coil,
        }
    }
}

/// Platform without hardware: every command lands in a shared log.
///
/// Clones share the log, so a test can keep one clone after handing the other to a
/// [`Machine`](crate::Machine).
#[derive(Debug, Clone, Default)]
pub struct VirtualPlatform {
    log: Arc<Mutex<Vec<DriverAction>>>,
}

impl VirtualPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn actions(&self) -> Vec<DriverAction> {
        self.log.lock().clone()
    }

    /// Actions on one coil, oldest first.
    #[must_use]
    pub fn actions_for(&self, coil: &str) -> Vec<DriverAction> {
        self.log.lock().iter().filter(|a| a.coil() == coil).cloned().collect()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl DriverPlatform for VirtualPlatform {
    fn pulse(&mut self, coil: &Coil, ms: u64) {
        self.log.lock().push(DriverAction::Pulse { coil: coil.name.clone(), ms });
    }

    fn enable(&mut self, coil: &Coil) {
        self.log.lock().push(DriverAction::Enable { coil: coil.name.clone() });
    }

    fn disable(&mut self, coil: &Coil) {
        self.log.lock().push(DriverAction::Disable { coil: coil.name.clone() });
    }
}

/// Coils by name, driven through one platform.
#[derive(Debug)]
pub struct DriverBank {
    coils: Vec<Coil>,
    by_name: FxHashMap<String, usize>,
    platform: Box<dyn DriverPlatform>,
}

impl DriverBank {
    pub fn new(platform: Box<dyn DriverPlatform>) -> Self {
        Self { coils: Vec::new(), by_name: FxHashMap::default(), platform }
    }

    /// Builds the bank from the `coils` section.
    pub fn from_config(config: &MachineConfig, platform: Box<dyn DriverPlatform>) -> Self {
        let mut bank = Self::new(platform);
        for (name, settings) in config.entries("coils") {
            let number = match settings.get("number") {
                Some(value) if !value.is_null() => value.to_string(),
                _ => String::new(),
            };
            bank.add(Coil {
                name: name.clone(),
                number,
                pulse_ms: settings.ms("pulse_ms").unwrap_or(DEFAULT_PULSE_MS),
                allow_enable: settings.bool("allow_enable"),
                enabled: false,
            });
        }
        bank
    }

    pub fn add(&mut self, coil: Coil) {
        self.by_name.insert(coil.name.clone(), self.coils.len());
        self.coils.push(coil);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Coil> {
        self.by_name.get(name).map(|&i| &self.coils[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coil> {
        self.coils.iter()
    }

    fn coil_mut(&mut self, name: &str) -> Result<&mut Coil, MachineError> {
        let index = *self.by_name.get(name).ok_or_else(|| MachineError::unknown("coil", name))?;
        Ok(&mut self.coils[index])
    }

    /// Pulses `name` for its configured `pulse_ms`.
    pub fn pulse(&mut self, name: &str) -> Result<(), MachineError> {
        let index = *self.by_name.get(name).ok_or_else(|| MachineError::unknown("coil", name))?;
        let coil = &self.coils[index];
        debug!(coil = name, ms = coil.pulse_ms, "Pulsing coil");
        self.platform.pulse(coil, coil.pulse_ms);
        Ok(())
    }

    pub fn enable(&mut self, name: &str) -> Result<(), MachineError> {
        let coil = self.coil_mut(name)?;
        coil.enabled = true;
        let coil = coil.clone();
        debug!(coil = name, "Enabling coil");
        self.platform.enable(&coil);
        Ok(())
    }

    pub fn disable(&mut self, name: &str) -> Result<(), MachineError> {
        let coil = self.coil_mut(name)?;
        coil.enabled = false;
        let coil = coil.clone();
        debug!(coil = name, "Disabling coil");
        self.platform.disable(&coil);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(platform: &VirtualPlatform) -> DriverBank {
        let mut bank = DriverBank::new(Box::new(platform.clone()));
        bank.add(Coil {
            name: "c_eject".into(),
            number: "3".into(),
            pulse_ms: 25,
            allow_enable: false,
            enabled: false,
        });
        bank
    }

    #[test]
    fn virtual_platform_records_actions() {
        let platform = VirtualPlatform::new();
        let mut bank = bank(&platform);

        bank.pulse("c_eject").unwrap();
        bank.enable("c_eject").unwrap();
        assert!(bank.get("c_eject").unwrap().enabled);
        bank.disable("c_eject").unwrap();

        assert_eq!(
            platform.actions(),
            [
                DriverAction::Pulse { coil: "c_eject".into(), ms: 25 },
                DriverAction::Enable { coil: "c_eject".into() },
                DriverAction::Disable { coil: "c_eject".into() },
            ]
        );
        platform.clear();
        assert!(platform.actions_for("c_eject").is_empty());
    }

    #[test]
    fn unknown_coil_is_an_error() {
        let platform = VirtualPlatform::new();
        let err = bank(&platform).pulse("c_missing").unwrap_err();
        assert_eq!(err.kind(), "unknown_device");
        assert!(err.to_string().contains("c_missing"));
    }
}
