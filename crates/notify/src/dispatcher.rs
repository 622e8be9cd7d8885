//! Routes watcher actions to registered handlers.
//!
//! Every key of an action's settings object that names a registered
//! handler kind is delivered to that handler. Individual action failures
//! don't block other actions.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use watchkeeper_core::WatcherDefinition;
use watchkeeper_engine::ActionDispatch;

use crate::traits::{Action, ActionHandler, DispatchResult};

/// Dispatches actions to the handler registered for each action kind.
pub struct Dispatcher {
    /// Action kind → handler.
    handlers: HashMap<String, Box<dyn ActionHandler>>,
}

impl Dispatcher {
    /// Create a dispatcher with no handlers.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Create a dispatcher from a list of handlers.
    pub fn with_handlers(handlers: Vec<Box<dyn ActionHandler>>) -> Self {
        let mut dispatcher = Self::empty();
        for handler in handlers {
            dispatcher.register(handler);
        }
        dispatcher
    }

    /// Register a handler, replacing any handler of the same kind.
    pub fn register(&mut self, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(handler.kind().to_string(), handler);
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Run every action through its handlers.
    ///
    /// Returns one result per (action, handler) delivery. Actions with no
    /// matching handler are logged and produce no result.
    pub async fn dispatch_all(
        &self,
        watcher_id: &str,
        actions: &IndexMap<String, Value>,
        payload: &Value,
        watcher: &WatcherDefinition,
    ) -> Vec<DispatchResult> {
        let mut results = Vec::new();

        for (name, settings) in actions {
            let routed: Vec<(&String, &Value)> = settings
                .as_object()
                .map(|map| map.iter().filter(|(kind, _)| self.handlers.contains_key(*kind)).collect())
                .unwrap_or_default();

            if routed.is_empty() {
                tracing::warn!(watcher_id, action = %name, "No handler registered for action");
                continue;
            }

            for (kind, kind_settings) in routed {
                let Some(handler) = self.handlers.get(kind) else {
                    continue;
                };
                let action = Action {
                    watcher_id,
                    name,
                    settings: kind_settings,
                    payload,
                    watcher,
                };

                let start = std::time::Instant::now();
                let result = handler.handle(&action).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                let (success, error) = match result {
                    Ok(()) => {
                        tracing::debug!(watcher_id, action = %name, kind = %kind, duration_ms, "Action delivered");
                        (true, None)
                    }
                    Err(e) => {
                        tracing::warn!(
                            watcher_id,
                            action = %name,
                            kind = %kind,
                            error = %e,
                            duration_ms,
                            "Action failed"
                        );
                        (false, Some(e.to_string()))
                    }
                };

                results.push(DispatchResult {
                    action: name.clone(),
                    kind: kind.clone(),
                    success,
                    error,
                    duration_ms,
                });
            }
        }

        results
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait::async_trait]
impl ActionDispatch for Dispatcher {
    async fn dispatch(
        &self,
        watcher_id: &str,
        actions: &IndexMap<String, Value>,
        payload: &Value,
        watcher: &WatcherDefinition,
    ) {
        let results = self.dispatch_all(watcher_id, actions, payload, watcher).await;
        let failed = results.iter().filter(|r| !r.success).count();
        tracing::info!(
            watcher_id,
            delivered = results.len() - failed,
            failed,
            "Dispatched actions"
        );
    }
}
