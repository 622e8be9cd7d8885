//! Per-firing execution pipeline.
//!
//! A firing runs one watcher snapshot through
//! search → condition → transform → dispatch. Report-class actions bypass
//! the search entirely when the watcher's `report` flag is set. Nothing in
//! here returns an error: every failure is logged and ends the firing, and
//! the [`FiringOutcome`] only says how far it got.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;
use watchkeeper_core::{WatcherDefinition, WatcherHit};

use crate::classify::classify;
use crate::dispatch::ActionDispatch;
use crate::script::{is_truthy, Bindings, ScriptEvaluator};
use crate::search::{SearchClient, SearchOperation};

#[cfg(test)]
mod tests;

/// Everything a single firing needs. Built once per installed timer and
/// shared by all of that timer's firings.
pub struct ExecutionContext {
    pub watcher_id: String,
    /// Snapshot captured when the timer was installed.
    pub hit: WatcherHit,
    pub search: Arc<dyn SearchClient>,
    /// Search operation resolved when the scheduler was built.
    pub operation: SearchOperation,
    pub dispatcher: Arc<dyn ActionDispatch>,
    pub evaluator: Arc<dyn ScriptEvaluator>,
}

/// How far a firing got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiringOutcome {
    /// Snapshot missing or disabled.
    Disabled,
    /// Snapshot has no actions.
    NoActions,
    Completed {
        /// Report-class actions were dispatched.
        reports: bool,
        /// Result of the alerting path, when there were non-report actions.
        alert: Option<AlertOutcome>,
    },
    /// Abandoned after exceeding the firing timeout.
    TimedOut,
}

/// Result of the alerting path of a firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Search request or condition missing.
    Malformed,
    /// The search (or the transform search) produced nothing.
    EmptyResult,
    SearchFailed,
    /// Condition falsy or failed to evaluate.
    ConditionNotMet,
    Dispatched,
}

/// Run one firing, abandoning it after `timeout` when one is set.
pub async fn fire_with_timeout(ctx: Arc<ExecutionContext>, timeout: Option<Duration>) -> FiringOutcome {
    let Some(limit) = timeout else {
        return fire(ctx).await;
    };
    let watcher_id = ctx.watcher_id.clone();
    match tokio::time::timeout(limit, fire(ctx)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(
                watcher_id = %watcher_id,
                timeout_secs = limit.as_secs(),
                "Firing exceeded timeout, abandoned"
            );
            FiringOutcome::TimedOut
        }
    }
}

/// Run one firing of the watcher held by `ctx`.
pub async fn fire(ctx: Arc<ExecutionContext>) -> FiringOutcome {
    let span = info_span!(
        "firing",
        watcher_id = %ctx.watcher_id,
        firing_id = %Uuid::new_v4()
    );
    run(&ctx).instrument(span).await
}

async fn run(ctx: &ExecutionContext) -> FiringOutcome {
    let watcher = match &ctx.hit.source {
        Some(w) if !w.disable => w,
        _ => {
            debug!("Non-executing disabled or missing watcher");
            return FiringOutcome::Disabled;
        }
    };

    if watcher.actions.is_empty() {
        info!(watcher = watcher.label(), "Watcher has no actions");
        return FiringOutcome::NoActions;
    }

    let (report_actions, alert_actions) = classify(&watcher.actions);

    let reports = watcher.report && !report_actions.is_empty();
    if reports {
        debug!(count = report_actions.len(), "Dispatching report actions");
        let payload = json!({ "id": ctx.watcher_id });
        ctx.dispatcher
            .dispatch(&ctx.watcher_id, &report_actions, &payload, watcher)
            .await;
    }

    let alert = if alert_actions.is_empty() {
        None
    } else {
        Some(run_alert(ctx, watcher, &alert_actions).await)
    };

    FiringOutcome::Completed { reports, alert }
}

async fn run_alert(
    ctx: &ExecutionContext,
    watcher: &WatcherDefinition,
    actions: &IndexMap<String, Value>,
) -> AlertOutcome {
    let (Some(request), Some(condition)) = (watcher.search_request(), watcher.condition_script()) else {
        debug!(watcher = watcher.label(), "Search request or condition malformed");
        return AlertOutcome::Malformed;
    };

    let payload = match search(ctx, request).await {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            info!(watcher = watcher.label(), "Search returned no result");
            return AlertOutcome::EmptyResult;
        }
        Err(outcome) => return outcome,
    };

    let mut bindings = Bindings::with_payload(payload);
    match ctx.evaluator.evaluate(condition, &mut bindings) {
        Ok(value) if is_truthy(&value) => {}
        Ok(_) => {
            debug!(watcher = watcher.label(), "Condition not met");
            return AlertOutcome::ConditionNotMet;
        }
        Err(e) => {
            info!(watcher_id = %ctx.watcher_id, error = %e, "Condition error");
            return AlertOutcome::ConditionNotMet;
        }
    }

    let payload = if let Some(script) = watcher.transform_script() {
        if let Err(e) = ctx.evaluator.evaluate(script, &mut bindings) {
            info!(watcher_id = %ctx.watcher_id, error = %e, "Transform script error");
        }
        bindings.into_payload()
    } else if let Some(transform_request) = watcher.transform_request() {
        match search(ctx, transform_request).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(watcher = watcher.label(), "Transform search returned no result");
                return AlertOutcome::EmptyResult;
            }
            Err(outcome) => return outcome,
        }
    } else {
        bindings.into_payload()
    };

    ctx.dispatcher
        .dispatch(&ctx.watcher_id, actions, &payload, watcher)
        .await;
    AlertOutcome::Dispatched
}

/// Run a search, folding a `null` body into "no result" and logging failures.
async fn search(ctx: &ExecutionContext, request: &Value) -> Result<Option<Value>, AlertOutcome> {
    match ctx.search.search(ctx.operation, request).await {
        Ok(Some(Value::Null)) | Ok(None) => Ok(None),
        Ok(Some(payload)) => Ok(Some(payload)),
        Err(e) => {
            error!(
                watcher_id = %ctx.watcher_id,
                operation = %ctx.operation,
                error = %e,
                "Search failed"
            );
            Err(AlertOutcome::SearchFailed)
        }
    }
}
