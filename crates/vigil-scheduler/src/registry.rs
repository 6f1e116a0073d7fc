use crate::timer::{TickFn, TimerEngine, TimerHandle};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use vigil_core::ProbeId;

/// Result of installing a schedule entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// No entry existed; a new one was installed
    Scheduled,
    /// An older entry was cancelled and replaced
    Replaced,
    /// The same version is already installed
    Unchanged,
    /// A newer version is already installed, or the key was removed at an
    /// equal or newer version; the incoming one was ignored
    Stale,
}

/// Result of removing a schedule entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// A running entry was cancelled
    Removed,
    /// Nothing was running; the removal is remembered
    Absent,
    /// A newer version is installed; the removal was ignored
    Stale,
}

/// Live registration of one probe with the timer engine
struct ScheduleEntry {
    version: DateTime<Utc>,
    interval: Duration,
    handle: TimerHandle,
}

enum Slot {
    Scheduled(ScheduleEntry),
    /// Unscheduled at `version`; older adds must not bring it back
    Removed { version: DateTime<Utc> },
}

impl Slot {
    fn version(&self) -> DateTime<Utc> {
        match self {
            Slot::Scheduled(entry) => entry.version,
            Slot::Removed { version } => *version,
        }
    }

    fn entry(&self) -> Option<&ScheduleEntry> {
        match self {
            Slot::Scheduled(entry) => Some(entry),
            Slot::Removed { .. } => None,
        }
    }
}

/// In-memory map of probe id to its schedule entry.
///
/// Every mutation happens under one lock, and the timer swap for a replace
/// happens under that same lock, so at most one timer exists per probe.
/// A removal leaves a versioned marker behind so that a redelivered older
/// definition cannot revive the probe. Callbacks run outside the lock.
#[derive(Default)]
pub struct ProbeRegistry {
    slots: Mutex<HashMap<ProbeId, Slot>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `tick` for `key` unless an equal or newer version is present
    pub async fn install(
        &self,
        engine: &dyn TimerEngine,
        key: ProbeId,
        version: DateTime<Utc>,
        interval: Duration,
        tick: TickFn,
    ) -> AddOutcome {
        let mut slots = self.slots.lock().await;

        match slots.get(&key) {
            Some(Slot::Scheduled(existing)) if version == existing.version => {
                return AddOutcome::Unchanged;
            }
            Some(slot) if version <= slot.version() => return AddOutcome::Stale,
            _ => {}
        }

        let handle = engine.schedule(interval, tick);
        let entry = ScheduleEntry {
            version,
            interval,
            handle,
        };

        match slots.insert(key, Slot::Scheduled(entry)) {
            Some(Slot::Scheduled(previous)) => {
                engine.cancel(previous.handle);
                AddOutcome::Replaced
            }
            Some(Slot::Removed { .. }) | None => AddOutcome::Scheduled,
        }
    }

    /// Cancel the entry for `key` unless a newer version is installed
    pub async fn remove(
        &self,
        engine: &dyn TimerEngine,
        key: ProbeId,
        version: DateTime<Utc>,
    ) -> RemoveOutcome {
        let mut slots = self.slots.lock().await;

        match slots.get(&key) {
            Some(slot) if version < slot.version() => return RemoveOutcome::Stale,
            _ => {}
        }

        match slots.insert(key, Slot::Removed { version }) {
            Some(Slot::Scheduled(entry)) => {
                engine.cancel(entry.handle);
                RemoveOutcome::Removed
            }
            Some(Slot::Removed { .. }) | None => RemoveOutcome::Absent,
        }
    }

    /// Version of the definition currently scheduled for `key`
    pub async fn version_of(&self, key: ProbeId) -> Option<DateTime<Utc>> {
        self.slots
            .lock()
            .await
            .get(&key)
            .and_then(Slot::entry)
            .map(|entry| entry.version)
    }

    /// Period of the entry currently scheduled for `key`
    pub async fn interval_of(&self, key: ProbeId) -> Option<Duration> {
        self.slots
            .lock()
            .await
            .get(&key)
            .and_then(Slot::entry)
            .map(|entry| entry.interval)
    }

    pub async fn len(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| slot.entry().is_some())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Scheduled probe ids in ascending order
    pub async fn keys(&self) -> Vec<ProbeId> {
        let mut keys: Vec<ProbeId> = self
            .slots
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| slot.entry().is_some())
            .map(|(key, _)| *key)
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Cancel every entry and forget removal markers, returning how many
    /// entries were cancelled
    pub async fn clear(&self, engine: &dyn TimerEngine) -> usize {
        let mut slots = self.slots.lock().await;
        let mut count = 0;
        for (_, slot) in slots.drain() {
            if let Slot::Scheduled(entry) = slot {
                engine.cancel(entry.handle);
                count += 1;
            }
        }
        count
    }
}
