//! Per-watcher schedule entry type.

use std::fmt;

use serde::Serialize;
use watchkeeper_core::WatcherHit;

use super::timer::TimerHandle;

/// Human-readable recurrence kept for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleInterval {
    /// The `later` phrase or cron expression as written.
    Later(String),
    /// Fixed interval in seconds.
    Seconds(u64),
}

impl fmt::Display for ScheduleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleInterval::Later(phrase) => f.write_str(phrase),
            ScheduleInterval::Seconds(n) => write!(f, "{n} seconds"),
        }
    }
}

/// Scheduling state for a single watcher.
#[derive(Debug)]
pub struct ScheduleEntry {
    /// Snapshot the running timer fires with; compared against fresh hits.
    pub hit: WatcherHit,
    pub interval: ScheduleInterval,
    /// Recurring timer; `None` once cancelled.
    pub timer: Option<TimerHandle>,
}

impl ScheduleEntry {
    /// Stop the recurring timer. Safe to call on an already-cleared entry.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}
