use crate::handler::{DeviceKey, Handler};

#[derive(Debug, Clone)]
struct Delay {
    owner: DeviceKey,
    name: &'static str,
    due: u64,
    seq: u64,
    handler: Handler,
}

/// Named one-shot timers, at most one per `(owner, name)`.
#[derive(Debug, Default)]
pub struct DelayManager {
    delays: Vec<Delay>,
    seq: u64,
}

impl DelayManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `handler` at `due` (absolute ms), replacing a delay with the same name.
    pub fn add(&mut self, name: &'static str, due: u64, handler: Handler) {
        let owner = handler.owner();
        self.remove(owner, name);
        self.seq += 1;
        self.delays.push(Delay { owner, name, due, seq: self.seq, handler });
    }

    /// Returns `true` if a delay was cancelled.
    pub fn remove(&mut self, owner: DeviceKey, name: &str) -> bool {
        let before = self.delays.len();
        self.delays.retain(|d| !(d.owner == owner && d.name == name));
        before != self.delays.len()
    }

    #[must_use]
    pub fn contains(&self, owner: DeviceKey, name: &str) -> bool {
        self.delays.iter().any(|d| d.owner == owner && d.name == name)
    }

    /// Earliest due time.
    #[must_use]
    pub fn next_due(&self) -> Option<u64> {
        self.delays.iter().map(|d| d.due).min()
    }

    /// Removes and returns the earliest delay due at `now`, as `(due, seq, handler)`.
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, u64, Handler)> {
        let (index, _) = self
            .delays
            .iter()
            .enumerate()
            .filter(|(_, d)| d.due <= now)
            .min_by_key(|(_, d)| (d.due, d.seq))?;
        let delay = self.delays.remove(index);
        Some((delay.due, delay.seq, delay.handler))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BallSaveAction, DeviceKind};

    const SAVE: DeviceKey = DeviceKey { kind: DeviceKind::BallSave, index: 0 };

    #[test]
    fn same_name_replaces() {
        let mut delays = DelayManager::new();
        delays.add("disable", 100, Handler::BallSave(0, BallSaveAction::Disable));
        delays.add("disable", 300, Handler::BallSave(0, BallSaveAction::Disable));
        assert_eq!(delays.len(), 1);
        assert!(delays.pop_due(200).is_none());
        assert_eq!(delays.next_due(), Some(300));
        assert!(delays.pop_due(300).is_some());
    }

    #[test]
    fn due_order_and_cancel() {
        let mut delays = DelayManager::new();
        delays.add("disable", 50, Handler::BallSave(0, BallSaveAction::Disable));
        delays.add("hurry_up", 20, Handler::BallSave(0, BallSaveAction::HurryUp));
        delays.add("grace_period", 40, Handler::BallSave(0, BallSaveAction::GracePeriod));
        assert!(delays.remove(SAVE, "grace_period"));
        assert!(!delays.contains(SAVE, "grace_period"));

        let fired: Vec<Handler> = std::iter::from_fn(|| delays.pop_due(100)).map(|(_, _, h)| h).collect();
        assert_eq!(
            fired,
            [Handler::BallSave(0, BallSaveAction::HurryUp), Handler::BallSave(0, BallSaveAction::Disable)]
        );
        assert!(delays.is_empty());
    }
}
