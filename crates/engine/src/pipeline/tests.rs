//! Tests for the execution pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use watchkeeper_core::WatcherHit;

use super::{fire, fire_with_timeout, AlertOutcome, FiringOutcome};
use crate::search::SearchError;
use crate::testing::{context, hit, MockDispatch, MockSearch};

fn alert_watcher(condition: &str) -> Value {
    json!({
        "trigger": { "schedule": { "interval": 5 } },
        "input": { "search": { "request": { "index": ["logs-*"], "body": { "size": 0 } } } },
        "condition": { "script": { "script": condition } },
        "actions": { "email_admin": { "email": { "to": "admin@example.com" } } }
    })
}

async fn run(source: Value, search: MockSearch) -> (FiringOutcome, Arc<MockSearch>, Arc<MockDispatch>) {
    let search = Arc::new(search);
    let dispatch = Arc::new(MockDispatch::default());
    let outcome = fire(context(hit("w1", source), search.clone(), dispatch.clone())).await;
    (outcome, search, dispatch)
}

fn alert(outcome: AlertOutcome) -> FiringOutcome {
    FiringOutcome::Completed {
        reports: false,
        alert: Some(outcome),
    }
}

// -- early exits -----------------------------------------------------------

#[tokio::test]
async fn disabled_watcher_does_nothing() {
    let mut source = alert_watcher("true");
    source["disable"] = json!(true);
    let (outcome, search, dispatch) = run(source, MockSearch::returning(json!({}))).await;

    assert_eq!(outcome, FiringOutcome::Disabled);
    assert_eq!(search.calls(), 0);
    assert!(dispatch.recorded().is_empty());
}

#[tokio::test]
async fn missing_source_counts_as_disabled() {
    let search = Arc::new(MockSearch::new());
    let dispatch = Arc::new(MockDispatch::default());
    let orphan = WatcherHit {
        id: "w1".to_string(),
        source: None,
    };
    let outcome = fire(context(orphan, search.clone(), dispatch.clone())).await;

    assert_eq!(outcome, FiringOutcome::Disabled);
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn watcher_without_actions_does_nothing() {
    let mut source = alert_watcher("true");
    source["actions"] = json!({});
    let (outcome, search, _) = run(source, MockSearch::returning(json!({}))).await;

    assert_eq!(outcome, FiringOutcome::NoActions);
    assert_eq!(search.calls(), 0);
}

// -- report path -----------------------------------------------------------

#[tokio::test]
async fn report_watcher_dispatches_id_without_searching() {
    let source = json!({
        "report": true,
        "actions": { "weekly": { "report": { "to": "ops@example.com" } } }
    });
    let (outcome, search, dispatch) = run(source, MockSearch::returning(json!({}))).await;

    assert_eq!(
        outcome,
        FiringOutcome::Completed {
            reports: true,
            alert: None
        }
    );
    assert_eq!(search.calls(), 0);
    let calls = dispatch.recorded();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].actions, vec!["weekly"]);
    assert_eq!(calls[0].payload, json!({ "id": "w1" }));
}

#[tokio::test]
async fn report_runs_despite_malformed_alert_fields() {
    let source = json!({
        "report": 1,
        "disable": null,
        "condition": { "script": {} },
        "input": { "search": "logs-*" },
        "actions": {
            "daily": { "report": { "to": "ops@example.com" } },
            "page": { "console": {} }
        }
    });
    let (outcome, search, dispatch) = run(source, MockSearch::returning(json!({}))).await;

    assert_eq!(
        outcome,
        FiringOutcome::Completed {
            reports: true,
            alert: Some(AlertOutcome::Malformed)
        }
    );
    assert_eq!(search.calls(), 0);
    let calls = dispatch.recorded();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].actions, vec!["daily"]);
    assert_eq!(calls[0].payload, json!({ "id": "w1" }));
}

#[tokio::test]
async fn report_actions_ignored_without_report_flag() {
    let source = json!({
        "actions": { "weekly": { "report": {} } }
    });
    let (outcome, search, dispatch) = run(source, MockSearch::new()).await;

    assert_eq!(
        outcome,
        FiringOutcome::Completed {
            reports: false,
            alert: None
        }
    );
    assert_eq!(search.calls(), 0);
    assert!(dispatch.recorded().is_empty());
}

#[tokio::test]
async fn mixed_watcher_runs_both_paths() {
    let mut source = alert_watcher("payload.hits.total > 0");
    source["report"] = json!(true);
    source["actions"]["weekly"] = json!({ "report": {} });
    let (outcome, _, dispatch) = run(source, MockSearch::returning(json!({ "hits": { "total": 1 } }))).await;

    assert_eq!(
        outcome,
        FiringOutcome::Completed {
            reports: true,
            alert: Some(AlertOutcome::Dispatched)
        }
    );
    let calls = dispatch.recorded();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].actions, vec!["weekly"]);
    assert_eq!(calls[1].actions, vec!["email_admin"]);
    assert_eq!(calls[1].payload, json!({ "hits": { "total": 1 } }));
}

// -- alert path ------------------------------------------------------------

#[tokio::test]
async fn truthy_condition_dispatches_search_result() {
    let (outcome, search, dispatch) = run(
        alert_watcher("payload.hits.total > 0"),
        MockSearch::returning(json!({ "hits": { "total": 3 } })),
    )
    .await;

    assert_eq!(outcome, alert(AlertOutcome::Dispatched));
    let requests = search.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, json!({ "index": ["logs-*"], "body": { "size": 0 } }));
    let calls = dispatch.recorded();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].watcher_id, "w1");
    assert_eq!(calls[0].payload, json!({ "hits": { "total": 3 } }));
}

#[tokio::test]
async fn false_condition_dispatches_nothing() {
    let (outcome, _, dispatch) = run(
        alert_watcher("payload.hits.total > 0"),
        MockSearch::returning(json!({ "hits": { "total": 0 } })),
    )
    .await;

    assert_eq!(outcome, alert(AlertOutcome::ConditionNotMet));
    assert!(dispatch.recorded().is_empty());
}

#[tokio::test]
async fn condition_error_is_treated_as_not_met() {
    let (outcome, _, dispatch) = run(
        alert_watcher("payload.aggregations.status.buckets.length > 0"),
        MockSearch::returning(json!({ "hits": { "total": 3 } })),
    )
    .await;

    assert_eq!(outcome, alert(AlertOutcome::ConditionNotMet));
    assert!(dispatch.recorded().is_empty());
}

#[tokio::test]
async fn missing_condition_skips_search() {
    let mut source = alert_watcher("true");
    source.as_object_mut().unwrap().remove("condition");
    let (outcome, search, dispatch) = run(source, MockSearch::returning(json!({}))).await;

    assert_eq!(outcome, alert(AlertOutcome::Malformed));
    assert_eq!(search.calls(), 0);
    assert!(dispatch.recorded().is_empty());
}

#[tokio::test]
async fn missing_request_skips_search() {
    let mut source = alert_watcher("true");
    source["input"] = json!({ "search": {} });
    let (outcome, search, dispatch) = run(source, MockSearch::returning(json!({}))).await;

    assert_eq!(outcome, alert(AlertOutcome::Malformed));
    assert_eq!(search.calls(), 0);
    assert!(dispatch.recorded().is_empty());
}

#[tokio::test]
async fn empty_search_result_aborts() {
    let (outcome, _, dispatch) = run(alert_watcher("true"), MockSearch::new()).await;
    assert_eq!(outcome, alert(AlertOutcome::EmptyResult));
    assert!(dispatch.recorded().is_empty());

    let (outcome, _, _) = run(alert_watcher("true"), MockSearch::new().then(Ok(Some(Value::Null)))).await;
    assert_eq!(outcome, alert(AlertOutcome::EmptyResult));
}

#[tokio::test]
async fn search_failure_is_contained() {
    let search = MockSearch::new().then(Err(SearchError::Status {
        status: 500,
        body: "shard failure".to_string(),
    }));
    let (outcome, _, dispatch) = run(alert_watcher("true"), search).await;

    assert_eq!(outcome, alert(AlertOutcome::SearchFailed));
    assert!(dispatch.recorded().is_empty());
}

// -- transforms ------------------------------------------------------------

#[tokio::test]
async fn transform_script_reshapes_payload() {
    let mut source = alert_watcher("payload.hits.total > 0");
    source["transform"] = json!({ "script": { "script": "payload.summary = 'total: ' + payload.hits.total" } });
    let (outcome, _, dispatch) = run(source, MockSearch::returning(json!({ "hits": { "total": 2 } }))).await;

    assert_eq!(outcome, alert(AlertOutcome::Dispatched));
    assert_eq!(
        dispatch.recorded()[0].payload,
        json!({ "hits": { "total": 2 }, "summary": "total: 2" })
    );
}

#[tokio::test]
async fn failing_transform_script_still_dispatches() {
    let mut source = alert_watcher("payload.hits.total > 0");
    source["transform"] = json!({ "script": { "script": "payload.marked = true; payload.missing.deeper.value" } });
    let (outcome, _, dispatch) = run(source, MockSearch::returning(json!({ "hits": { "total": 2 } }))).await;

    assert_eq!(outcome, alert(AlertOutcome::Dispatched));
    assert_eq!(
        dispatch.recorded()[0].payload,
        json!({ "hits": { "total": 2 }, "marked": true })
    );
}

#[tokio::test]
async fn transform_search_replaces_payload() {
    let mut source = alert_watcher("payload.hits.total > 0");
    source["transform"] = json!({ "search": { "request": { "index": ["detail-*"] } } });
    let search = MockSearch::new()
        .then(Ok(Some(json!({ "hits": { "total": 1 } }))))
        .then(Ok(Some(json!({ "detail": [1, 2, 3] }))));
    let (outcome, search, dispatch) = run(source, search).await;

    assert_eq!(outcome, alert(AlertOutcome::Dispatched));
    assert_eq!(search.calls(), 2);
    assert_eq!(search.requests.lock().unwrap()[1].1, json!({ "index": ["detail-*"] }));
    assert_eq!(dispatch.recorded()[0].payload, json!({ "detail": [1, 2, 3] }));
}

#[tokio::test]
async fn empty_transform_search_aborts_silently() {
    let mut source = alert_watcher("payload.hits.total > 0");
    source["transform"] = json!({ "search": { "request": { "index": ["detail-*"] } } });
    let search = MockSearch::new()
        .then(Ok(Some(json!({ "hits": { "total": 1 } }))))
        .then(Ok(None));
    let (outcome, search, dispatch) = run(source, search).await;

    assert_eq!(outcome, alert(AlertOutcome::EmptyResult));
    assert_eq!(search.calls(), 2);
    assert!(dispatch.recorded().is_empty());
}

// -- timeout ---------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn slow_firing_times_out() {
    let search = Arc::new(MockSearch::returning(json!({ "hits": { "total": 1 } })).delayed(Duration::from_secs(60)));
    let dispatch = Arc::new(MockDispatch::default());
    let ctx = context(hit("w1", alert_watcher("true")), search, dispatch.clone());

    let outcome = fire_with_timeout(ctx, Some(Duration::from_secs(5))).await;
    assert_eq!(outcome, FiringOutcome::TimedOut);
    assert!(dispatch.recorded().is_empty());
}

#[tokio::test(start_paused = true)]
async fn no_timeout_waits_for_completion() {
    let search = Arc::new(MockSearch::returning(json!({ "hits": { "total": 1 } })).delayed(Duration::from_secs(60)));
    let dispatch = Arc::new(MockDispatch::default());
    let ctx = context(hit("w1", alert_watcher("true")), search, dispatch.clone());

    let outcome = fire_with_timeout(ctx, None).await;
    assert_eq!(outcome, alert(AlertOutcome::Dispatched));
    assert_eq!(dispatch.recorded().len(), 1);
}
