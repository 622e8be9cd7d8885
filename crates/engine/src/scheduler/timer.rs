//! Recurring timer tasks.
//!
//! Each installed watcher gets one tokio task that waits for the next tick
//! and spawns the firing as a task of its own. Aborting the timer task stops
//! future ticks without touching a firing that is already running.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::pipeline::{fire_with_timeout, ExecutionContext};

use super::recurrence::Recurrence;

/// Owns a timer task. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start the recurring timer for `ctx`. Must be called within a tokio runtime.
pub(crate) fn spawn_timer(
    recurrence: Recurrence,
    ctx: Arc<ExecutionContext>,
    firing_timeout: Option<Duration>,
) -> TimerHandle {
    let task = tokio::spawn(async move {
        match recurrence {
            Recurrence::Every(period) => {
                // First tick one period after installation, not immediately.
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    launch(&ctx, firing_timeout);
                }
            }
            recurrence @ Recurrence::Cron(_) => {
                let mut last_tick = None;
                loop {
                    let now = Utc::now();
                    let from = match last_tick {
                        Some(last) if last > now => last,
                        _ => now,
                    };
                    let Some(next) = recurrence.next_tick(from) else {
                        debug!(watcher_id = %ctx.watcher_id, "Schedule has no upcoming ticks");
                        return;
                    };
                    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                    tokio::time::sleep(wait).await;
                    last_tick = Some(next);
                    launch(&ctx, firing_timeout);
                }
            }
        }
    });
    TimerHandle { task }
}

fn launch(ctx: &Arc<ExecutionContext>, firing_timeout: Option<Duration>) {
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let watcher_id = ctx.watcher_id.clone();
        let outcome = fire_with_timeout(ctx, firing_timeout).await;
        debug!(watcher_id = %watcher_id, ?outcome, "Firing finished");
    });
}
