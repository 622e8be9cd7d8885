//! Search contract and search-operation resolution.
//!
//! Clusters running the distributed-search extension expose specialized
//! endpoints next to the plain `_search` one. Which operation a firing uses
//! is resolved once, when the scheduler is built, from the operations the
//! client declares.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// A named search operation offered by a search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchOperation {
    Search,
    KibiSearch,
    VanguardSearch,
}

impl SearchOperation {
    /// Preference order when the distributed-search extension is present.
    pub const PREFERENCE: [SearchOperation; 3] = [
        SearchOperation::KibiSearch,
        SearchOperation::VanguardSearch,
        SearchOperation::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchOperation::Search => "search",
            SearchOperation::KibiSearch => "kibi_search",
            SearchOperation::VanguardSearch => "vanguard_search",
        }
    }
}

impl fmt::Display for SearchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchOperation {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(SearchOperation::Search),
            "kibi_search" => Ok(SearchOperation::KibiSearch),
            "vanguard_search" => Ok(SearchOperation::VanguardSearch),
            other => Err(SearchError::Unsupported(other.to_string())),
        }
    }
}

/// Abstraction over the search backend used by firings.
#[async_trait::async_trait]
pub trait SearchClient: Send + Sync {
    /// Whether this client offers `op`.
    fn supports(&self, op: SearchOperation) -> bool;

    /// Run `request` with the given operation.
    ///
    /// `Ok(None)` means the search produced no result at all (as opposed to
    /// a result with zero hits).
    async fn search(&self, op: SearchOperation, request: &Value) -> Result<Option<Value>, SearchError>;
}

/// Errors raised by a [`SearchClient`].
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(String),

    #[error("search returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode search response: {0}")]
    Decode(String),

    #[error("unsupported search operation: {0}")]
    Unsupported(String),
}

/// Pick the search operation firings will use.
///
/// With the distributed-search extension available, the first operation in
/// [`SearchOperation::PREFERENCE`] the client supports wins; otherwise the
/// plain search is used.
pub fn resolve_search_operation(client: &dyn SearchClient, distributed_extension: bool) -> SearchOperation {
    if !distributed_extension {
        return SearchOperation::Search;
    }
    SearchOperation::PREFERENCE
        .into_iter()
        .find(|op| client.supports(*op))
        .unwrap_or(SearchOperation::Search)
}
