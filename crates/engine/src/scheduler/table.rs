//! The timer table: watcher id → [`ScheduleEntry`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use watchkeeper_core::WatcherHit;

use super::entry::{ScheduleEntry, ScheduleInterval};

/// Shared, mutex-guarded map of scheduled watchers.
///
/// Holds at most one entry, and so at most one timer, per watcher id.
/// Every operation that replaces or drops an entry cancels its timer first.
/// The lock is never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct ScheduleTable {
    entries: Arc<Mutex<HashMap<String, ScheduleEntry>>>,
}

impl ScheduleTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ScheduleEntry>> {
        self.entries.lock().expect("schedule table lock poisoned")
    }

    /// Ids of every scheduled watcher.
    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Whether `hit` is scheduled with a structurally equal snapshot.
    pub fn is_current(&self, hit: &WatcherHit) -> bool {
        self.lock()
            .get(&hit.id)
            .is_some_and(|entry| entry.hit == *hit)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Insert `entry`, cancelling and returning any entry it replaces.
    pub fn insert(&self, id: String, entry: ScheduleEntry) -> Option<ScheduleEntry> {
        let mut previous = self.lock().insert(id, entry);
        if let Some(old) = previous.as_mut() {
            old.cancel();
        }
        previous
    }

    /// Cancel and remove the entry for `id`.
    pub fn remove(&self, id: &str) -> Option<ScheduleEntry> {
        let mut removed = self.lock().remove(id);
        if let Some(entry) = removed.as_mut() {
            entry.cancel();
        }
        removed
    }

    /// Cancel and remove every entry.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        for entry in entries.values_mut() {
            entry.cancel();
        }
        entries.clear();
        count
    }

    /// `(id, interval)` for every entry, sorted by id.
    pub fn snapshot(&self) -> Vec<(String, ScheduleInterval)> {
        let mut out: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.interval.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Whether the entry for `id` still owns a live timer.
    pub fn has_active_timer(&self, id: &str) -> bool {
        self.lock()
            .get(id)
            .and_then(|entry| entry.timer.as_ref())
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
