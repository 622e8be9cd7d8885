//! Watcher storage contract.

use watchkeeper_core::WatcherHit;

/// Abstraction over the index holding watcher definitions.
///
/// The `elastic` crate implements this against the configured cluster;
/// the engine only depends on this trait.
#[async_trait::async_trait]
pub trait WatcherStore: Send + Sync {
    /// Total number of stored watcher records.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Fetch up to `size` watcher records.
    ///
    /// Listing needs an upper bound, which is why reconciliation calls
    /// [`count`](WatcherStore::count) first.
    async fn watchers(&self, size: u64) -> Result<Vec<WatcherHit>, StoreError>;
}

/// Errors raised by a [`WatcherStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The watcher index does not exist yet.
    #[error("watcher index not found: {0}")]
    NotFound(String),

    #[error("storage request failed: {0}")]
    Http(String),

    #[error("storage returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode storage response: {0}")]
    Decode(String),
}
