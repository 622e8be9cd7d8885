//! URL building and response parsing, kept free of I/O.

use serde_json::{json, Value};
use tracing::warn;
use watchkeeper_core::WatcherHit;
use watchkeeper_engine::SearchOperation;

/// Path suffix of each search operation.
pub fn endpoint(op: SearchOperation) -> &'static str {
    match op {
        SearchOperation::Search => "_search",
        SearchOperation::KibiSearch => "_kibi/search",
        SearchOperation::VanguardSearch => "_vanguard/search",
    }
}

/// Comma-joined index list from a search request's `index` field, which
/// may be a string or an array of strings.
pub fn indices(request: &Value) -> Option<String> {
    let joined = match request.get("index")? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(","),
        _ => return None,
    };
    (!joined.is_empty()).then_some(joined)
}

/// `(path, body)` for a watcher search request `{ index?, body? }`.
pub fn search_target(op: SearchOperation, request: &Value) -> (String, Value) {
    let path = match indices(request) {
        Some(indices) => format!("/{indices}/{}", endpoint(op)),
        None => format!("/{}", endpoint(op)),
    };
    let body = request.get("body").cloned().unwrap_or_else(|| json!({}));
    (path, body)
}

/// Read `count` from a `_count` response.
pub fn parse_count(response: &Value) -> Option<u64> {
    response.get("count")?.as_u64()
}

/// Map `hits.hits` of a `_search` response to watcher hits.
///
/// A hit whose `_source` does not parse is kept with no source, so the
/// watcher still takes part in orphan detection but never fires.
pub fn parse_watcher_hits(response: &Value) -> Vec<WatcherHit> {
    let Some(hits) = response.pointer("/hits/hits").and_then(Value::as_array) else {
        return Vec::new();
    };

    hits.iter()
        .filter_map(|raw| {
            let id = raw.get("_id").and_then(Value::as_str)?;
            match WatcherHit::from_value(raw.clone()) {
                Ok(hit) => Some(hit),
                Err(e) => {
                    warn!(watcher_id = %id, error = %e, "malformed watcher definition");
                    Some(WatcherHit {
                        id: id.to_string(),
                        source: None,
                    })
                }
            }
        })
        .collect()
}
