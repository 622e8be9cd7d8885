//! Mock collaborators shared by the pipeline and scheduler tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use watchkeeper_core::{WatcherDefinition, WatcherHit};

use crate::dispatch::ActionDispatch;
use crate::pipeline::ExecutionContext;
use crate::script::ExpressionEvaluator;
use crate::search::{SearchClient, SearchError, SearchOperation};
use crate::store::{StoreError, WatcherStore};

// ── Search ──────────────────────────────────────────────────────────

/// Search client answering from a queue of canned responses; an empty
/// queue answers with the fallback.
pub(crate) struct MockSearch {
    responses: Mutex<VecDeque<Result<Option<Value>, SearchError>>>,
    fallback: Option<Value>,
    delay: Option<Duration>,
    pub requests: Mutex<Vec<(SearchOperation, Value)>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `payload` once the queue is drained.
    pub fn returning(payload: Value) -> Self {
        Self {
            fallback: Some(payload),
            ..Self::new()
        }
    }

    pub fn then(self, response: Result<Option<Value>, SearchError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl SearchClient for MockSearch {
    fn supports(&self, op: SearchOperation) -> bool {
        op == SearchOperation::Search
    }

    async fn search(&self, op: SearchOperation, request: &Value) -> Result<Option<Value>, SearchError> {
        self.requests.lock().unwrap().push((op, request.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.responses.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

// ── Dispatch ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Dispatched {
    pub watcher_id: String,
    pub actions: Vec<String>,
    pub payload: Value,
}

/// Records every dispatch.
#[derive(Default)]
pub(crate) struct MockDispatch {
    pub calls: Mutex<Vec<Dispatched>>,
}

impl MockDispatch {
    pub fn recorded(&self) -> Vec<Dispatched> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ActionDispatch for MockDispatch {
    async fn dispatch(
        &self,
        watcher_id: &str,
        actions: &IndexMap<String, Value>,
        payload: &Value,
        _watcher: &WatcherDefinition,
    ) {
        self.calls.lock().unwrap().push(Dispatched {
            watcher_id: watcher_id.to_string(),
            actions: actions.keys().cloned().collect(),
            payload: payload.clone(),
        });
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Watcher store serving whatever hit set was last installed.
#[derive(Default)]
pub(crate) struct MockStore {
    hits: Mutex<Vec<WatcherHit>>,
    missing_index: Mutex<bool>,
    failing: Mutex<bool>,
    pub count_calls: AtomicUsize,
    pub list_sizes: Mutex<Vec<u64>>,
}

impl MockStore {
    pub fn with_hits(hits: Vec<WatcherHit>) -> Self {
        let store = Self::default();
        store.set_hits(hits);
        store
    }

    pub fn set_hits(&self, hits: Vec<WatcherHit>) {
        *self.hits.lock().unwrap() = hits;
    }

    pub fn set_missing_index(&self, missing: bool) {
        *self.missing_index.lock().unwrap() = missing;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait::async_trait]
impl WatcherStore for MockStore {
    async fn count(&self) -> Result<u64, StoreError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if *self.missing_index.lock().unwrap() {
            return Err(StoreError::NotFound("watcher".to_string()));
        }
        if *self.failing.lock().unwrap() {
            return Err(StoreError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(self.hits.lock().unwrap().len() as u64)
    }

    async fn watchers(&self, size: u64) -> Result<Vec<WatcherHit>, StoreError> {
        self.list_sizes.lock().unwrap().push(size);
        let hits = self.hits.lock().unwrap();
        Ok(hits.iter().take(size as usize).cloned().collect())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

/// Parse a watcher hit from a JSON `_source` document.
pub(crate) fn hit(id: &str, source: Value) -> WatcherHit {
    WatcherHit::new(id, serde_json::from_value(source).unwrap())
}

pub(crate) fn context(
    hit: WatcherHit,
    search: Arc<MockSearch>,
    dispatch: Arc<MockDispatch>,
) -> Arc<ExecutionContext> {
    Arc::new(ExecutionContext {
        watcher_id: hit.id.clone(),
        hit,
        search,
        operation: SearchOperation::Search,
        dispatcher: dispatch,
        evaluator: Arc::new(ExpressionEvaluator::new()),
    })
}
