//! Watcher scheduling and execution engine.
//!
//! This crate provides:
//! - A restricted expression evaluator for watcher conditions and transforms
//! - Report / alert action classification
//! - The per-firing execution pipeline (search → condition → transform → actions)
//! - The schedule reconciler and its timer table
//!
//! Storage, search and action delivery are reached through the traits in
//! [`store`], [`search`] and [`dispatch`]; the `elastic` and `notify` crates
//! provide the production implementations.

pub mod classify;
pub mod dispatch;
pub mod pipeline;
pub mod scheduler;
pub mod script;
pub mod search;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::classify;
pub use dispatch::ActionDispatch;
pub use pipeline::{fire, AlertOutcome, ExecutionContext, FiringOutcome};
pub use scheduler::{ReconcileReport, SchedulerOptions, WatcherScheduler};
pub use script::{Bindings, ExpressionEvaluator, ScriptError, ScriptEvaluator};
pub use search::{resolve_search_operation, SearchClient, SearchError, SearchOperation};
pub use store::{StoreError, WatcherStore};
