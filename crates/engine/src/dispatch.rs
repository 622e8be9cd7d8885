//! Action dispatch contract.

use indexmap::IndexMap;
use serde_json::Value;
use watchkeeper_core::WatcherDefinition;

/// Hands a subset of a watcher's actions to the delivery backend.
///
/// Fire-and-forget from the engine's point of view: delivery failures are
/// the implementation's concern and are never reported back.
#[async_trait::async_trait]
pub trait ActionDispatch: Send + Sync {
    async fn dispatch(
        &self,
        watcher_id: &str,
        actions: &IndexMap<String, Value>,
        payload: &Value,
        watcher: &WatcherDefinition,
    );
}
