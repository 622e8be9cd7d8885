//! Action handler trait definition and shared error types.

use serde_json::Value;
use watchkeeper_core::WatcherDefinition;

/// Errors that can occur while handling an action.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Action failed: {0}")]
    Handler(String),
}

/// One action of one firing, as seen by a handler.
#[derive(Debug, Clone, Copy)]
pub struct Action<'a> {
    pub watcher_id: &'a str,
    /// Action name as written in the watcher's `actions` map.
    pub name: &'a str,
    /// Settings under the handler's own key, e.g. the value of `console`.
    pub settings: &'a Value,
    pub payload: &'a Value,
    pub watcher: &'a WatcherDefinition,
}

/// A handler for one kind of action (`console`, `email`, ...).
///
/// The kind is the settings key the handler claims: an action
/// `{ "console": { ... } }` is routed to the handler whose
/// [`kind`](ActionHandler::kind) is `"console"`.
#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, action: &Action<'_>) -> Result<(), NotifyError>;

    fn kind(&self) -> &str;
}

/// Result of running a single action through a single handler.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub action: String,
    pub kind: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
