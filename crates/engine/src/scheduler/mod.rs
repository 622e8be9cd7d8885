//! Per-watcher recurring timers, kept in step with storage.
//!
//! [`WatcherScheduler::reconcile`] fetches the stored watchers, drops timers
//! whose watcher is gone, leaves unchanged watchers alone and (re)installs a
//! timer for every new or changed one. Each timer fires the execution
//! pipeline with the snapshot it was installed with.

mod core;
mod entry;
pub(crate) mod recurrence;
mod table;
mod timer;


pub use self::core::{ReconcileReport, ScheduleError, SchedulerOptions, WatcherScheduler};
pub use self::entry::{ScheduleEntry, ScheduleInterval};
pub use self::recurrence::{Recurrence, RecurrenceError};
pub use self::table::ScheduleTable;
pub use self::timer::TimerHandle;
