//! [`WatcherScheduler`]: reconciles stored watchers against the timer table.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use watchkeeper_core::{Config, IntervalValue, WatcherHit};

use crate::dispatch::ActionDispatch;
use crate::pipeline::ExecutionContext;
use crate::script::ScriptEvaluator;
use crate::search::{resolve_search_operation, SearchClient, SearchOperation};
use crate::store::{StoreError, WatcherStore};

use super::entry::{ScheduleEntry, ScheduleInterval};
use super::recurrence::{Recurrence, RecurrenceError};
use super::table::ScheduleTable;
use super::timer::spawn_timer;

/// Knobs for a [`WatcherScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// The distributed-search extension is installed on the cluster.
    pub distributed_search: bool,
    /// Abandon a firing after this long; `None` lets firings run unbounded.
    pub firing_timeout: Option<Duration>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            distributed_search: false,
            firing_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl SchedulerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            distributed_search: config.elasticsearch.distributed_search_available(),
            firing_timeout: config.watcher.firing_timeout(),
        }
    }
}

/// Per-cycle counters returned by [`WatcherScheduler::reconcile`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// New watchers given a timer.
    pub scheduled: usize,
    /// Changed watchers whose timer was replaced.
    pub rescheduled: usize,
    /// Watchers whose snapshot matched the scheduled one.
    pub unchanged: usize,
    /// Watchers with no schedulable trigger; they hold no entry.
    pub unscheduled: usize,
    /// Orphaned entries removed.
    pub removed: usize,
    /// Watchers that could not be processed.
    pub failed: usize,
}

/// Failure to schedule one watcher.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid recurrence: {0}")]
    Recurrence(#[from] RecurrenceError),

    #[error("no tokio runtime available to run the timer")]
    NoRuntime,
}

enum Disposition {
    Scheduled,
    Rescheduled,
    Unchanged,
    Unscheduled,
}

/// Keeps one recurring timer per stored watcher.
///
/// Call [`reconcile`](WatcherScheduler::reconcile) periodically (or use
/// [`run`](WatcherScheduler::run)). Unchanged watchers keep their timers,
/// changed ones are rescheduled with the fresh snapshot and watchers gone
/// from storage lose theirs.
pub struct WatcherScheduler {
    store: Arc<dyn WatcherStore>,
    search: Arc<dyn SearchClient>,
    operation: SearchOperation,
    dispatcher: Arc<dyn ActionDispatch>,
    evaluator: Arc<dyn ScriptEvaluator>,
    options: SchedulerOptions,
    table: ScheduleTable,
}

impl WatcherScheduler {
    pub fn new(
        store: Arc<dyn WatcherStore>,
        search: Arc<dyn SearchClient>,
        dispatcher: Arc<dyn ActionDispatch>,
        evaluator: Arc<dyn ScriptEvaluator>,
        options: SchedulerOptions,
    ) -> Self {
        let operation = resolve_search_operation(search.as_ref(), options.distributed_search);
        info!(
            operation = %operation,
            distributed_search = options.distributed_search,
            "resolved search operation"
        );
        Self {
            store,
            search,
            operation,
            dispatcher,
            evaluator,
            options,
            table: ScheduleTable::new(),
        }
    }

    /// Search operation every firing uses.
    pub fn operation(&self) -> SearchOperation {
        self.operation
    }

    pub fn table(&self) -> &ScheduleTable {
        &self.table
    }

    /// `(id, interval)` of every scheduled watcher, sorted by id.
    pub fn scheduled(&self) -> Vec<(String, ScheduleInterval)> {
        self.table.snapshot()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Cancel every timer and clear the table. Returns the number of
    /// entries cleared.
    pub fn shutdown(&self) -> usize {
        self.table.clear()
    }

    /// Reconcile now, then every `interval`, until `shutdown` is notified.
    /// All timers are cancelled on the way out.
    pub async fn run(&self, interval: Duration, shutdown: Arc<Notify>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reconcile().await;
                }
                _ = shutdown.notified() => {
                    info!("watcher scheduler shutting down");
                    break;
                }
            }
        }

        let cleared = self.shutdown();
        info!(cleared, "watcher scheduler stopped");
    }

    /// Bring the timer table in line with storage.
    ///
    /// Never fails: a missing watcher index is logged as informational, any
    /// other fetch error at error level, and per-watcher failures are logged
    /// and counted without stopping the cycle.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let hits = match self.fetch().await {
            Ok(hits) => hits,
            Err(StoreError::NotFound(index)) => {
                info!(index = %index, "no watcher index found, nothing to schedule yet");
                return report;
            }
            Err(e) => {
                error!(error = %e, "failed to fetch watchers");
                return report;
            }
        };

        // Orphans: scheduled but no longer stored.
        let fetched: HashSet<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
        for id in self.table.ids() {
            if fetched.contains(id.as_str()) {
                continue;
            }
            if self.table.remove(&id).is_some() {
                info!(watcher_id = %id, "deleting orphan watcher");
                report.removed += 1;
            }
        }

        for hit in hits {
            let id = hit.id.clone();
            match self.schedule_hit(hit) {
                Ok(Disposition::Scheduled) => report.scheduled += 1,
                Ok(Disposition::Rescheduled) => report.rescheduled += 1,
                Ok(Disposition::Unchanged) => report.unchanged += 1,
                Ok(Disposition::Unscheduled) => report.unscheduled += 1,
                Err(e) => {
                    error!(watcher_id = %id, error = %e, "failed to schedule watcher");
                    report.failed += 1;
                }
            }
        }

        debug!(?report, scheduled_total = self.table.len(), "reconciliation finished");
        report
    }

    async fn fetch(&self) -> Result<Vec<WatcherHit>, StoreError> {
        let count = self.store.count().await?;
        self.store.watchers(count).await
    }

    fn schedule_hit(&self, hit: WatcherHit) -> Result<Disposition, ScheduleError> {
        if self.table.is_current(&hit) {
            return Ok(Disposition::Unchanged);
        }

        let replaced = self.table.remove(&hit.id).is_some();
        if replaced {
            info!(watcher_id = %hit.id, "clearing watcher");
        }

        let Some((recurrence, interval)) = resolve_recurrence(&hit)? else {
            debug!(watcher_id = %hit.id, "watcher has no schedulable trigger");
            return Ok(Disposition::Unscheduled);
        };

        tokio::runtime::Handle::try_current().map_err(|_| ScheduleError::NoRuntime)?;
        self.check_scripts(&hit);

        let ctx = Arc::new(ExecutionContext {
            watcher_id: hit.id.clone(),
            hit: hit.clone(),
            search: Arc::clone(&self.search),
            operation: self.operation,
            dispatcher: Arc::clone(&self.dispatcher),
            evaluator: Arc::clone(&self.evaluator),
        });
        let timer = spawn_timer(recurrence, ctx, self.options.firing_timeout);

        info!(watcher_id = %hit.id, interval = %interval, "scheduled watcher");
        self.table.insert(
            hit.id.clone(),
            ScheduleEntry {
                hit,
                interval,
                timer: Some(timer),
            },
        );

        Ok(if replaced {
            Disposition::Rescheduled
        } else {
            Disposition::Scheduled
        })
    }
}

impl WatcherScheduler {
    /// Warn about condition or transform scripts that will never parse.
    /// The watcher is scheduled regardless; at firing time a broken condition
    /// reads as "not met" and a broken transform is skipped.
    fn check_scripts(&self, hit: &WatcherHit) {
        let Some(watcher) = hit.source.as_ref() else {
            return;
        };
        let scripts = [
            ("condition", watcher.condition_script()),
            ("transform", watcher.transform_script()),
        ];
        for (kind, script) in scripts {
            let Some(script) = script else { continue };
            if let Err(e) = self.evaluator.check(script) {
                warn!(watcher_id = %hit.id, script = kind, error = %e, "watcher script does not parse");
            }
        }
    }
}

/// Resolve a watcher's trigger: a `later` phrase first, then a whole-number
/// `interval`. `Ok(None)` means there is nothing to schedule.
pub(crate) fn resolve_recurrence(
    hit: &WatcherHit,
) -> Result<Option<(Recurrence, ScheduleInterval)>, RecurrenceError> {
    let Some(schedule) = hit.source.as_ref().and_then(|source| source.schedule()) else {
        return Ok(None);
    };

    if let Some(phrase) = schedule.later.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        let recurrence = Recurrence::from_phrase(phrase)?;
        return Ok(Some((recurrence, ScheduleInterval::Later(phrase.to_string()))));
    }

    let Some(secs) = schedule.interval.as_ref().and_then(IntervalValue::whole_seconds) else {
        return Ok(None);
    };
    Ok(Recurrence::every_seconds(secs).map(|r| (r, ScheduleInterval::Seconds(secs))))
}
