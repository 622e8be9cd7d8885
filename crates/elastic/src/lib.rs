//! Elasticsearch backend for the watcher engine.
//!
//! [`ElasticClient`] talks to the cluster over HTTP with `reqwest` and
//! implements both the engine's `WatcherStore` (reading watcher definitions
//! from the watcher index) and its `SearchClient` (running watcher queries).

pub mod client;
pub mod request;

pub use client::{ElasticClient, ElasticError};
